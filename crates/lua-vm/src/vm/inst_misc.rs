use lua_core::Instruction;

use crate::error::LuaError;
use crate::state::LuaState;

// R(A) := R(B)
pub(super) fn move_(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.copy(b + 1, a + 1)
}

// pc += sBx; if A: close all upvalues >= R(A - 1)
pub(super) fn jmp(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, sbx) = i.asbx_args();
    vm.add_pc(sbx);
    if a != 0 {
        vm.close_upvalues(a);
    }
    Ok(())
}

// R(A), R(A+1), ..., R(A+B) := nil
pub(super) fn load_nil(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.push_nil();
    for idx in a + 1..=a + b + 1 {
        vm.copy(-1, idx)?;
    }
    vm.pop(1)
}

// R(A) := (bool)B; if (C) pc++
pub(super) fn load_bool(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.push_boolean(b != 0);
    vm.replace(a + 1)?;
    if c != 0 {
        vm.add_pc(1);
    }
    Ok(())
}

// R(A) := Kst(Bx)
pub(super) fn load_k(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, bx) = i.abx_args();
    vm.get_const(bx)?;
    vm.replace(a + 1)
}

// R(A) := Kst(extra arg)
pub(super) fn load_kx(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, _) = i.abx_args();
    let ax = vm.fetch()?.ax_arg();
    vm.get_const(ax)?;
    vm.replace(a + 1)
}
