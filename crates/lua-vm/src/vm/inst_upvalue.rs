use lua_core::Instruction;

use crate::error::LuaError;
use crate::state::{upvalue_index, LuaState};

// R(A) := UpValue[B]
pub(super) fn get_upval(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.copy(upvalue_index(b + 1), a + 1)
}

// UpValue[B] := R(A)
pub(super) fn set_upval(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.copy(a + 1, upvalue_index(b + 1))
}

// R(A) := UpValue[B][RK(C)]
pub(super) fn get_tabup(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(c)?;
    vm.get_table(upvalue_index(b + 1))?;
    vm.replace(a + 1)
}

// UpValue[A][RK(B)] := RK(C)
pub(super) fn set_tabup(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(b)?;
    vm.get_rk(c)?;
    vm.set_table(upvalue_index(a + 1))
}
