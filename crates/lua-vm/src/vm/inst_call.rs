//! Calls, returns, varargs and closure creation.
//!
//! A CALL with C == 0 or a VARARG with B == 0 leaves its values on top of the
//! stack, above the register window, followed by an integer marker holding
//! the stack index of the register the values were meant for. The next
//! instruction with B == 0 (CALL, RETURN, SETLIST) pops the marker and
//! consumes everything above the window.

use lua_core::Instruction;

use crate::error::LuaError;
use crate::state::LuaState;

// R(A) := closure(KPROTO[Bx])
pub(super) fn closure(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, bx) = i.abx_args();
    vm.load_proto(bx)?;
    vm.replace(a + 1)
}

// R(A), R(A+1), ..., R(A+C-2) = R(A)(R(A+1), ..., R(A+B-1))
pub(super) fn call(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, c) = i.abc_args();
    let a = a + 1;
    let n_args = push_func_and_args(a, b, vm)?;
    vm.call(n_args, c - 1)?;
    pop_results(a, c, vm)
}

// return R(A)(R(A+1), ..., R(A+B-1))
//
// Runs as an ordinary call keeping every result; the RETURN that follows
// (always with B == 0) passes them on.
pub(super) fn tail_call(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    let a = a + 1;
    let n_args = push_func_and_args(a, b, vm)?;
    vm.call(n_args, -1)?;
    pop_results(a, 0, vm)
}

// return R(A), ..., R(A+B-2)
//
// Stages the results above the register window, where the caller collects
// them.
pub(super) fn return_(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    let a = a + 1;
    match b {
        1 => vm.set_top(vm.register_count()),
        b if b > 1 => {
            vm.set_top(vm.register_count())?;
            if !vm.check_stack(b - 1) {
                return Err(LuaError::StackOverflow);
            }
            for idx in a..=a + b - 2 {
                vm.push_value(idx)?;
            }
            Ok(())
        }
        _ => fix_stack(a, vm),
    }
}

// R(A), R(A+1), ..., R(A+B-2) = vararg
pub(super) fn vararg(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, b, _) = i.abc_args();
    let a = a + 1;
    if b != 1 {
        vm.load_varargs(b - 1);
        pop_results(a, b, vm)?;
    }
    Ok(())
}

/// Push the function at `a` and its arguments; returns the argument count.
/// `b == 0` means the arguments run up to the top (multi-result marker).
fn push_func_and_args(a: i32, b: i32, vm: &mut LuaState) -> Result<i32, LuaError> {
    if b >= 1 {
        if !vm.check_stack(b) {
            return Err(LuaError::StackOverflow);
        }
        for idx in a..a + b {
            vm.push_value(idx)?;
        }
        Ok(b - 1)
    } else {
        fix_stack(a, vm)?;
        Ok(vm.get_top() - vm.register_count() - 1)
    }
}

/// Pop the marker left by a multi-result instruction and move the fixed
/// registers `a..marker` below the variable values above the window.
fn fix_stack(a: i32, vm: &mut LuaState) -> Result<(), LuaError> {
    let marker = vm.to_integer(-1) as i32;
    vm.pop(1)?;
    let fixed = marker - a;
    if fixed < 0 {
        return Err(LuaError::Internal(format!("bad multi-result marker {marker}")));
    }
    if fixed == 0 {
        return Ok(());
    }
    if !vm.check_stack(fixed) {
        return Err(LuaError::StackOverflow);
    }
    for idx in a..marker {
        vm.push_value(idx)?;
    }
    vm.rotate(vm.register_count() + 1, fixed)
}

/// Move call results into `R(a)...`: `c - 1` of them, or, for `c == 0`,
/// leave them on top and push the marker.
fn pop_results(a: i32, c: i32, vm: &mut LuaState) -> Result<(), LuaError> {
    match c {
        1 => Ok(()),
        c if c > 1 => {
            for idx in (a..=a + c - 2).rev() {
                vm.replace(idx)?;
            }
            Ok(())
        }
        _ => {
            vm.push_integer(i64::from(a));
            Ok(())
        }
    }
}
