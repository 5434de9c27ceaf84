use lua_core::number::float_to_integer;
use lua_core::{Instruction, Number};

use crate::error::LuaError;
use crate::state::LuaState;
use crate::value::LuaValue;

// ── Numeric for ───────────────────────────────────────────────────────────────

// R(A) -= R(A+2); pc += sBx
//
// Integer loops are used when the initial value and the step are integers;
// the limit is then clipped to an integer. Anything else runs as a float
// loop.
pub(super) fn for_prep(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, sbx) = i.asbx_args();
    let (init, limit, step) = (vm.to_value(a + 1), vm.to_value(a + 2), vm.to_value(a + 3));

    if let (LuaValue::Integer(init), LuaValue::Integer(step)) = (&init, &step) {
        if let Some((limit, skip)) = integer_limit(&limit, *step) {
            let start = if skip { 0 } else { *init };
            vm.push(LuaValue::Integer(start.wrapping_sub(*step)));
            vm.replace(a + 1)?;
            vm.push(LuaValue::Integer(limit));
            vm.replace(a + 2)?;
            vm.add_pc(sbx);
            return Ok(());
        }
    }

    let limit = for_number(&limit, "limit")?;
    let step = for_number(&step, "step")?;
    let init = for_number(&init, "initial value")?;
    vm.push_number(init - step);
    vm.replace(a + 1)?;
    vm.push_number(limit);
    vm.replace(a + 2)?;
    vm.push_number(step);
    vm.replace(a + 3)?;
    vm.add_pc(sbx);
    Ok(())
}

// R(A) += R(A+2); if R(A) <?= R(A+1) then { pc += sBx; R(A+3) = R(A) }
pub(super) fn for_loop(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, sbx) = i.asbx_args();
    let next = match (vm.to_value(a + 1), vm.to_value(a + 2), vm.to_value(a + 3)) {
        (LuaValue::Integer(idx), LuaValue::Integer(limit), LuaValue::Integer(step)) => {
            let idx = idx.wrapping_add(step);
            let go_on = if step > 0 { idx <= limit } else { limit <= idx };
            go_on.then_some(LuaValue::Integer(idx))
        }
        (idx, limit, step) => {
            let (Some(idx), Some(limit), Some(step)) = (idx.to_float(), limit.to_float(), step.to_float())
            else {
                return Err(LuaError::Internal("'for' state is not numeric".into()));
            };
            let idx = idx + step;
            let go_on = if step > 0.0 { idx <= limit } else { limit <= idx };
            go_on.then_some(LuaValue::Float(idx))
        }
    };
    if let Some(idx) = next {
        vm.push(idx);
        vm.copy(-1, a + 1)?;
        vm.replace(a + 4)?;
        vm.add_pc(sbx);
    }
    Ok(())
}

/// Clip a loop limit to an integer for a loop with integer `step`. Returns the
/// limit and whether the loop must be skipped outright, or `None` when the
/// limit is not a number.
fn integer_limit(limit: &LuaValue, step: i64) -> Option<(i64, bool)> {
    let f = match limit.to_number()? {
        Number::Integer(n) => return Some((n, false)),
        Number::Float(f) => f,
    };
    let rounded = if step < 0 { f.ceil() } else { f.floor() };
    if let Some(n) = float_to_integer(rounded) {
        return Some((n, false));
    }
    // Out of range or NaN: the loop runs to the end of the integers or never.
    if f > 0.0 {
        Some((i64::MAX, step < 0))
    } else {
        Some((i64::MIN, step > 0))
    }
}

fn for_number(val: &LuaValue, what: &str) -> Result<f64, LuaError> {
    val.to_float()
        .ok_or_else(|| LuaError::Runtime(LuaValue::string(format!("'for' {what} must be a number"))))
}

// ── Generic for ───────────────────────────────────────────────────────────────

// R(A+3), ..., R(A+2+C) := R(A)(R(A+1), R(A+2))
pub(super) fn tfor_call(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, _, c) = i.abc_args();
    for idx in a + 1..=a + 3 {
        vm.push_value(idx)?;
    }
    vm.call(2, c)?;
    for idx in (a + 4..a + 4 + c).rev() {
        vm.replace(idx)?;
    }
    Ok(())
}

// if R(A+1) ~= nil then { R(A) = R(A+1); pc += sBx }
pub(super) fn tfor_loop(i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    let (a, sbx) = i.asbx_args();
    if !vm.is_nil(a + 2) {
        vm.copy(a + 2, a + 1)?;
        vm.add_pc(sbx);
    }
    Ok(())
}
