//! `lua-vm` — register-based virtual machine for Lua 5.3 bytecode, the
//! stack-based embedding API around it, and coroutines.
//!
//! A host creates a [`LuaState`], loads a binary chunk with
//! [`LuaState::load`] and runs it with [`LuaState::call`] or
//! [`LuaState::pcall`]. Host functions are plain `fn(&mut LuaState)` values
//! that read their arguments from the stack and push their results.

pub mod arith;
pub mod closure;
pub mod config;
pub mod coroutine;
pub mod error;
pub mod state;
pub mod stdlib;
pub mod table;
pub mod value;
mod vm;


pub use arith::{ArithOp, CompareOp};
pub use closure::{FunctionBody, HostFunction, LuaClosure, Upvalue};
pub use config::{VmConfig, LUA_MAX_STACK, LUA_MIN_STACK};
pub use coroutine::{Coroutine, CoroutineStatus};
pub use error::LuaError;
pub use state::{
    upvalue_index, LuaState, ThreadStatus, LUA_MULTRET, LUA_REGISTRY_INDEX, LUA_RIDX_GLOBALS,
    LUA_RIDX_MAINTHREAD,
};
pub use table::LuaTable;
pub use value::{LuaType, LuaValue, TableRef};
