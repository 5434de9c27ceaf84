use std::sync::Arc;

use crate::closure::{HostFunction, LuaClosure, Upvalue};
use crate::error::LuaError;
use crate::state::LuaState;
use crate::value::LuaValue;

impl LuaState {
    pub fn push_nil(&mut self) {
        self.push(LuaValue::Nil);
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.push(LuaValue::Boolean(b));
    }

    pub fn push_integer(&mut self, n: i64) {
        self.push(LuaValue::Integer(n));
    }

    pub fn push_number(&mut self, n: f64) {
        self.push(LuaValue::Float(n));
    }

    pub fn push_string(&mut self, s: impl Into<String>) {
        self.push(LuaValue::LuaString(s.into()));
    }

    pub fn push_host_function(&mut self, f: HostFunction) {
        self.push(LuaValue::Function(Arc::new(LuaClosure::host(f, Vec::new()))));
    }

    /// Pop `n` values and push a host closure capturing them as upvalues
    /// `1..=n`, in stack order.
    pub fn push_host_closure(&mut self, f: HostFunction, n: i32) -> Result<(), LuaError> {
        let upvalues = self.pop_values(n)?.into_iter().map(Upvalue::closed).collect();
        self.push(LuaValue::Function(Arc::new(LuaClosure::host(f, upvalues))));
        Ok(())
    }

    pub fn push_global_table(&mut self) {
        let globals = self.globals();
        self.push(globals);
    }

    /// Push the running coroutine; returns `true` on the main thread.
    pub fn push_coroutine(&mut self) -> bool {
        match self.handle.upgrade() {
            Some(co) => {
                let is_main = co.is_main();
                self.push(LuaValue::Coroutine(co));
                is_main
            }
            None => {
                self.push_nil();
                false
            }
        }
    }
}
