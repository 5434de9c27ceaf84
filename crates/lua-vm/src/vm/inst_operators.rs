use lua_core::Instruction;

use crate::arith::{ArithOp, CompareOp};
use crate::error::LuaError;
use crate::state::LuaState;

// ── Arithmetic ────────────────────────────────────────────────────────────────

// R(A) := RK(B) op RK(C)
pub(super) fn binary_arith(i: Instruction, vm: &mut LuaState, op: ArithOp) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(b)?;
    vm.get_rk(c)?;
    vm.arith(op)?;
    vm.replace(a + 1)
}

// R(A) := op R(B)
pub(super) fn unary_arith(i: Instruction, vm: &mut LuaState, op: ArithOp) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.push_value(b + 1)?;
    vm.arith(op)?;
    vm.replace(a + 1)
}

// R(A) := not R(B)
pub(super) fn not(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    let truthy = vm.to_boolean(b + 1);
    vm.push_boolean(!truthy);
    vm.replace(a + 1)
}

// R(A) := length of R(B)
pub(super) fn length(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    vm.len(b + 1)?;
    vm.replace(a + 1)
}

// R(A) := R(B).. ... ..R(C)
pub(super) fn concat(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    let n = c - b + 1;
    if !vm.check_stack(n) {
        return Err(LuaError::StackOverflow);
    }
    for idx in b + 1..=c + 1 {
        vm.push_value(idx)?;
    }
    vm.concat(n)?;
    vm.replace(a + 1)
}

// ── Comparison and tests ──────────────────────────────────────────────────────

// if ((RK(B) op RK(C)) ~= A) then pc++
pub(super) fn compare(i: Instruction, vm: &mut LuaState, op: CompareOp) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    vm.get_rk(b)?;
    vm.get_rk(c)?;
    let result = vm.compare(-2, -1, op)?;
    if result != (a != 0) {
        vm.add_pc(1);
    }
    vm.pop(2)
}

// if not (R(A) <=> C) then pc++
pub(super) fn test(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, _, c) = i.abc_args();
    if vm.to_boolean(a + 1) != (c != 0) {
        vm.add_pc(1);
    }
    Ok(())
}

// if (R(B) <=> C) then R(A) := R(B) else pc++
pub(super) fn test_set(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    if vm.to_boolean(b + 1) == (c != 0) {
        vm.copy(b + 1, a + 1)
    } else {
        vm.add_pc(1);
        Ok(())
    }
}
