use std::sync::Arc;

use lua_chunk::{is_binary_chunk, undump};
use lua_core::Prototype;
use tracing::{debug, trace};

use crate::closure::{FunctionBody, HostFunction, LuaClosure, Upvalue};
use crate::error::LuaError;
use crate::state::{Frame, LuaState, ThreadStatus};
use crate::value::LuaValue;
use crate::vm;

// ── Calls ─────────────────────────────────────────────────────────────────────

impl LuaState {
    /// Call the function sitting below the top `n_args` values.
    ///
    /// The function and its arguments are popped and replaced by the results:
    /// all of them when `n_results` is negative, otherwise exactly
    /// `n_results`, truncated or padded with nil.
    pub fn call(&mut self, n_args: i32, n_results: i32) -> Result<(), LuaError> {
        if n_args < 0 || n_args >= self.get_top() {
            return Err(LuaError::Stack(format!("cannot call with {n_args} arguments")));
        }
        if self.call_depth() >= self.global.config.max_call_depth {
            return Err(LuaError::StackOverflow);
        }
        let func_idx = -(n_args + 1);
        let (closure, n_args) = match self.get(func_idx)? {
            LuaValue::Function(c) => (c, n_args),
            other => {
                let LuaValue::Function(mm) = self.metamethod(&other, "__call") else {
                    return Err(LuaError::NotCallable(other.type_name()));
                };
                trace!(target: "lua::vm", "metamethod dispatch: __call");
                // [callee, args..] becomes [mm, callee, args..]
                self.push(LuaValue::Function(mm.clone()));
                self.insert(func_idx - 1)?;
                (mm, n_args + 1)
            }
        };
        match &closure.body {
            FunctionBody::Lua(proto) => {
                let proto = proto.clone();
                self.call_lua(closure, proto, n_args, n_results)
            }
            FunctionBody::Host(f) => {
                let f = *f;
                self.call_host(closure, f, n_args, n_results)
            }
        }
    }

    fn call_lua(
        &mut self,
        closure: Arc<LuaClosure>,
        proto: Arc<Prototype>,
        n_args: i32,
        n_results: i32,
    ) -> Result<(), LuaError> {
        let n_regs = proto.max_register_size as usize;
        let n_params = proto.num_params as usize;
        let mut args = self.pop_values(n_args)?;
        self.pop(1)?;

        let varargs = if proto.is_vararg && args.len() > n_params {
            args.split_off(n_params)
        } else {
            Vec::new()
        };
        args.resize(n_params, LuaValue::Nil);
        args.resize(n_regs.max(n_params), LuaValue::Nil);
        args.reserve(self.global.config.min_stack);

        trace!(
            target: "lua::vm",
            source = %proto.source,
            line = proto.line_defined,
            depth = self.call_depth(),
            "call lua function"
        );
        self.push_frame(Frame::new(Some(closure), args, varargs));
        let outcome = vm::execute(self);
        let frame = self.pop_frame()?;
        outcome?;

        if n_results != 0 {
            let results = {
                let mut slots = frame.slots.write();
                let start = n_regs.min(slots.len());
                slots.split_off(start)
            };
            self.push_results(results, n_results);
        }
        Ok(())
    }

    fn call_host(
        &mut self,
        closure: Arc<LuaClosure>,
        f: HostFunction,
        n_args: i32,
        n_results: i32,
    ) -> Result<(), LuaError> {
        let mut args = self.pop_values(n_args)?;
        self.pop(1)?;
        args.reserve(self.global.config.min_stack);

        trace!(target: "lua::vm", depth = self.call_depth(), "call host function");
        self.push_frame(Frame::new(Some(closure), args, Vec::new()));
        let outcome = f(self);
        let frame = self.pop_frame()?;
        let n = outcome?;

        if n_results != 0 {
            let results = {
                let mut slots = frame.slots.write();
                let len = slots.len();
                if n < 0 || n as usize > len {
                    return Err(LuaError::Stack(format!(
                        "host function returned {n} results with {len} values on its stack"
                    )));
                }
                slots.split_off(len - n as usize)
            };
            self.push_results(results, n_results);
        }
        Ok(())
    }

    /// Push `results` adjusted to `n_results` (negative keeps them all).
    fn push_results(&mut self, mut results: Vec<LuaValue>, n_results: i32) {
        if n_results >= 0 {
            results.resize(n_results as usize, LuaValue::Nil);
        }
        self.push_values(results);
    }

    /// Call `f` with `args` from Rust and collect its results.
    pub fn call_value(
        &mut self,
        f: LuaValue,
        args: Vec<LuaValue>,
        n_results: i32,
    ) -> Result<Vec<LuaValue>, LuaError> {
        let base = self.get_top();
        let n_args = args.len() as i32;
        self.push(f);
        self.push_values(args);
        self.call(n_args, n_results)?;
        let produced = self.get_top() - base;
        self.pop_values(produced)
    }

    // ── Protected calls ───────────────────────────────────────────────────────

    /// Like [`call`](Self::call), but an error stops at this boundary: the
    /// stack is cut back to where the function was, the error object
    /// (transformed by the handler at `msgh` when non-zero) is pushed and an
    /// error status returned.
    pub fn pcall(&mut self, n_args: i32, n_results: i32, msgh: i32) -> ThreadStatus {
        let handler = match msgh {
            0 => None,
            idx => self.value_at(idx).ok().flatten(),
        };
        let base = (self.get_top() - n_args - 1).max(0);
        let depth = self.call_depth();

        let err = match self.call(n_args, n_results) {
            Ok(()) => return ThreadStatus::Ok,
            Err(err) => err,
        };
        debug!(target: "lua::vm", error = %err, depth, "protected call caught error");
        while self.call_depth() > depth {
            if self.pop_frame().is_err() {
                break;
            }
        }

        let mut value = err.into_value();
        if let Some(handler) = handler {
            value = match self.call_value(handler, vec![value], 1) {
                Ok(mut results) => results.pop().unwrap_or(LuaValue::Nil),
                Err(handler_err) => handler_err.into_value(),
            };
        }
        let _ = self.set_top(base);
        self.push(value);
        ThreadStatus::ErrRun
    }

    /// Pop the error object on top of the stack and turn it into an error to
    /// be returned from a host function.
    pub fn error(&mut self) -> LuaError {
        match self.pop_value() {
            Ok(value) => LuaError::Runtime(value),
            Err(err) => err,
        }
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Load a binary chunk and push its main function. On failure an error
    /// message is pushed instead and `ErrSyntax` returned.
    pub fn load(&mut self, chunk: &[u8], chunk_name: &str, mode: &str) -> ThreadStatus {
        let message = if !is_binary_chunk(chunk) {
            format!("{chunk_name}: attempt to load a text chunk (no compiler available)")
        } else if !mode.contains('b') {
            format!("{chunk_name}: attempt to load a binary chunk (mode is '{mode}')")
        } else {
            match undump(chunk) {
                Ok(proto) => {
                    self.load_prototype(proto);
                    return ThreadStatus::Ok;
                }
                Err(err) => format!("{chunk_name}: {err}"),
            }
        };
        debug!(target: "lua::vm", chunk = chunk_name, %message, "load failed");
        self.push_string(message);
        ThreadStatus::ErrSyntax
    }

    /// Push a closure over `proto` whose first upvalue (`_ENV`) is the
    /// globals table. Further upvalues start out nil.
    pub fn load_prototype(&mut self, proto: Arc<Prototype>) {
        let globals = self.globals();
        let upvalues = (0..proto.upvalues.len())
            .map(|i| Upvalue::closed(if i == 0 { globals.clone() } else { LuaValue::Nil }))
            .collect();
        self.push(LuaValue::Function(Arc::new(LuaClosure::lua(proto, upvalues))));
    }
}
