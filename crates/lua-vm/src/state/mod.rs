//! `LuaState`: one thread of execution and the stack API that host functions
//! and the dispatcher both drive.
//!
//! Stack indices follow the C API: positive indices are 1-based slots of the
//! current frame, negative indices count down from the top, `0` is never
//! valid. `LUA_REGISTRY_INDEX` addresses the registry and the indices below
//! it address the running closure's upvalues (see [`upvalue_index`]).

mod api_access;
mod api_arith;
mod api_call;
mod api_push;
mod api_stack;
mod api_table;
mod api_vm;
mod auxlib;
mod frame;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::{VmConfig, LUA_MAX_STACK};
use crate::coroutine::{Coroutine, CoroutineLink};
use crate::error::LuaError;
use crate::table::LuaTable;
use crate::value::{LuaType, LuaValue, TableRef};

pub(crate) use frame::Frame;

/// Pseudo-index of the registry table.
pub const LUA_REGISTRY_INDEX: i32 = -(LUA_MAX_STACK as i32) - 1000;

/// Result count meaning "all of them".
pub const LUA_MULTRET: i32 = -1;

/// Registry slot holding the main coroutine.
pub const LUA_RIDX_MAINTHREAD: i64 = 1;

/// Registry slot holding the globals table.
pub const LUA_RIDX_GLOBALS: i64 = 2;

/// Pseudo-index of the running closure's upvalue `n` (1-based).
pub const fn upvalue_index(n: i32) -> i32 {
    LUA_REGISTRY_INDEX - n
}

/// Outcome of a protected call, a load or a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Ok,
    Yield,
    ErrRun,
    ErrSyntax,
}

/// State shared by the main thread and every coroutine it creates.
pub(crate) struct GlobalState {
    pub(crate) registry: TableRef,
    /// Metatables for non-table types, indexed by `LuaType::tag`.
    pub(crate) type_metatables: RwLock<[Option<TableRef>; LuaType::COUNT]>,
    pub(crate) config: VmConfig,
    next_coroutine_id: AtomicU64,
}

impl GlobalState {
    pub(crate) fn next_coroutine_id(&self) -> u64 {
        self.next_coroutine_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// One thread of execution: a chain of call frames over the shared global
/// state.
pub struct LuaState {
    pub(crate) global: Arc<GlobalState>,
    /// The running frame.
    pub(crate) current: Frame,
    /// Suspended callers, innermost last.
    pub(crate) callers: Vec<Frame>,
    /// Handle of the coroutine this state runs in.
    pub(crate) handle: Weak<Coroutine>,
    /// Channels back to the resumer; `None` on the main thread.
    pub(crate) link: Option<CoroutineLink>,
}

impl Default for LuaState {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaState {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let registry: TableRef = Arc::new(RwLock::new(LuaTable::new()));
        let min_stack = config.min_stack;
        let global = Arc::new(GlobalState {
            registry: registry.clone(),
            type_metatables: RwLock::new(Default::default()),
            config,
            next_coroutine_id: AtomicU64::new(1),
        });
        let main = Arc::new(Coroutine::main());
        {
            let mut reg = registry.write();
            reg.put_int(LUA_RIDX_MAINTHREAD, LuaValue::Coroutine(main.clone()));
            reg.put_int(LUA_RIDX_GLOBALS, LuaValue::new_table());
        }
        Self {
            global,
            current: Frame::base(min_stack),
            callers: Vec::new(),
            handle: Arc::downgrade(&main),
            link: None,
        }
    }

    /// A fresh thread over `global`, for the coroutine behind `handle`.
    pub(crate) fn for_coroutine(global: Arc<GlobalState>, handle: Weak<Coroutine>) -> Self {
        let min_stack = global.config.min_stack;
        Self {
            global,
            current: Frame::base(min_stack),
            callers: Vec::new(),
            handle,
            link: None,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.global.config
    }

    /// Number of active frames, the base frame included.
    pub fn call_depth(&self) -> usize {
        self.callers.len() + 1
    }

    pub(crate) fn registry(&self) -> &TableRef {
        &self.global.registry
    }

    pub(crate) fn globals(&self) -> LuaValue {
        self.global.registry.read().get_int(LUA_RIDX_GLOBALS)
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        let caller = std::mem::replace(&mut self.current, frame);
        self.callers.push(caller);
    }

    /// Pop the running frame, closing its open upvalues.
    pub(crate) fn pop_frame(&mut self) -> Result<Frame, LuaError> {
        let caller = self
            .callers
            .pop()
            .ok_or_else(|| LuaError::Internal("call stack underflow".into()))?;
        let mut frame = std::mem::replace(&mut self.current, caller);
        frame.close_upvalues(0);
        Ok(frame)
    }
}
