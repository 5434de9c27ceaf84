use std::sync::Arc;

use crate::closure::HostFunction;
use crate::coroutine::Coroutine;
use crate::error::LuaError;
use crate::state::{upvalue_index, LuaState, ThreadStatus};
use crate::value::LuaType;

const CO_FUNCS: &[(&str, HostFunction)] = &[
    ("create", co_create),
    ("isyieldable", co_isyieldable),
    ("resume", co_resume),
    ("running", co_running),
    ("status", co_status),
    ("wrap", co_wrap),
    ("yield", co_yield),
];

pub fn open_coroutine(state: &mut LuaState) -> Result<i32, LuaError> {
    state.new_lib(CO_FUNCS)?;
    Ok(1)
}

fn check_coroutine(state: &LuaState, arg: i32) -> Result<Arc<Coroutine>, LuaError> {
    state
        .to_coroutine(arg)
        .ok_or_else(|| state.arg_error(arg, "coroutine expected"))
}

/// Resume `co` with the top `n_args` values. `Ok(n)` leaves `n` transferred
/// values on top; `Err(())` leaves one error object on top.
fn aux_resume(state: &mut LuaState, co: &Arc<Coroutine>, n_args: i32) -> Result<Result<i32, ()>, LuaError> {
    let base = state.get_top() - n_args;
    match state.resume(co, n_args) {
        Ok(ThreadStatus::Ok | ThreadStatus::Yield) => Ok(Ok(state.get_top() - base)),
        Ok(_) => Ok(Err(())),
        Err(LuaError::Coroutine(msg)) => {
            state.push_string(msg);
            Ok(Err(()))
        }
        Err(err) => Err(err),
    }
}

fn co_create(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_type(1, LuaType::Function)?;
    state.push_value(1)?;
    state.new_coroutine()?;
    Ok(1)
}

fn co_resume(state: &mut LuaState) -> Result<i32, LuaError> {
    let co = check_coroutine(state, 1)?;
    let n_args = state.get_top() - 1;
    match aux_resume(state, &co, n_args)? {
        Ok(n) => {
            state.push_boolean(true);
            state.insert(-(n + 1))?;
            Ok(n + 1)
        }
        Err(()) => {
            state.push_boolean(false);
            state.insert(-2)?;
            Ok(2)
        }
    }
}

fn co_wrap(state: &mut LuaState) -> Result<i32, LuaError> {
    co_create(state)?;
    state.push_host_closure(wrap_aux, 1)?;
    Ok(1)
}

/// Body of the functions returned by `coroutine.wrap`: resumes the coroutine
/// in upvalue 1 and raises its errors in the caller.
fn wrap_aux(state: &mut LuaState) -> Result<i32, LuaError> {
    let co = state
        .to_coroutine(upvalue_index(1))
        .ok_or_else(|| LuaError::Internal("wrapped coroutine missing".into()))?;
    let n_args = state.get_top();
    match aux_resume(state, &co, n_args)? {
        Ok(n) => Ok(n),
        Err(()) => Err(state.error()),
    }
}

fn co_yield(state: &mut LuaState) -> Result<i32, LuaError> {
    let n = state.get_top();
    state.yield_values(n)
}

fn co_status(state: &mut LuaState) -> Result<i32, LuaError> {
    let co = check_coroutine(state, 1)?;
    let name = state.status(&co).name();
    state.push_string(name);
    Ok(1)
}

fn co_running(state: &mut LuaState) -> Result<i32, LuaError> {
    let is_main = state.push_coroutine();
    state.push_boolean(is_main);
    Ok(2)
}

fn co_isyieldable(state: &mut LuaState) -> Result<i32, LuaError> {
    let yieldable = state.is_yieldable();
    state.push_boolean(yieldable);
    Ok(1)
}
