use lua_core::instruction::LFIELDS_PER_FLUSH;
use lua_core::number::fb2int;
use lua_core::Instruction;

use crate::error::LuaError;
use crate::state::LuaState;

// R(A) := {} (size = B,C)
pub(super) fn new_table(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.create_table(fb2int(b) as i32, fb2int(c) as i32);
    vm.replace(a + 1)
}

// R(A) := R(B)[RK(C)]
pub(super) fn get_table(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(c)?;
    vm.get_table(b + 1)?;
    vm.replace(a + 1)
}

// R(A)[RK(B)] := RK(C)
pub(super) fn set_table(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(b)?;
    vm.get_rk(c)?;
    vm.set_table(a + 1)
}

// R(A+1) := R(B); R(A) := R(B)[RK(C)]
pub(super) fn self_(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.copy(b + 1, a + 2)?;
    vm.get_rk(c)?;
    vm.get_table(b + 1)?;
    vm.replace(a + 1)
}

// R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B
//
// B == 0 takes the values up to the top, left there by a multi-result CALL
// or VARARG together with its marker. C == 0 takes the batch number from the
// following EXTRAARG.
pub(super) fn set_list(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    let a = a + 1;
    let batch = if c > 0 { c - 1 } else { vm.fetch()?.ax_arg() };

    let multi = b == 0;
    let fixed = if multi {
        let marker = vm.to_integer(-1) as i32;
        vm.pop(1)?;
        marker - a - 1
    } else {
        b
    };

    let mut idx = i64::from(batch) * i64::from(LFIELDS_PER_FLUSH);
    for j in 1..=fixed {
        idx += 1;
        vm.push_value(a + j)?;
        vm.set_i(a, idx)?;
    }
    if multi {
        let registers = vm.register_count();
        for j in registers + 1..=vm.get_top() {
            idx += 1;
            vm.push_value(j)?;
            vm.set_i(a, idx)?;
        }
        vm.set_top(registers)?;
    }
    Ok(())
}
