//! Host-side standard libraries: the base library and `coroutine`.

pub mod base;
pub mod coroutine;

use crate::closure::HostFunction;

/// Version string stored in `_VERSION`.
pub const LUA_VERSION: &str = "Lua 5.3";

/// Libraries opened by `LuaState::open_libs`, in order.
pub(crate) const LIBS: &[(&str, HostFunction)] = &[
    ("_G", base::open_base),
    ("coroutine", coroutine::open_coroutine),
];
