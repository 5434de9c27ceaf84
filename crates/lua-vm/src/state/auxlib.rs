//! Helpers for writing host functions and libraries on top of the stack API.

use tracing::debug;

use crate::closure::HostFunction;
use crate::error::LuaError;
use crate::state::{LuaState, ThreadStatus, LUA_MULTRET, LUA_REGISTRY_INDEX};
use crate::stdlib;
use crate::value::{LuaType, LuaValue};

/// Registry field holding loaded modules.
pub const LOADED_TABLE: &str = "_LOADED";

impl LuaState {
    // ── Errors ────────────────────────────────────────────────────────────────

    /// A runtime error carrying `msg` as its error object.
    pub fn error_message(&self, msg: impl Into<String>) -> LuaError {
        LuaError::Runtime(LuaValue::LuaString(msg.into()))
    }

    pub fn arg_error(&self, arg: i32, msg: impl Into<String>) -> LuaError {
        LuaError::BadArgument {
            arg,
            message: msg.into(),
        }
    }

    pub fn arg_check(&self, cond: bool, arg: i32, msg: &str) -> Result<(), LuaError> {
        if cond {
            Ok(())
        } else {
            Err(self.arg_error(arg, msg))
        }
    }

    fn type_error(&self, arg: i32, expected: &str) -> LuaError {
        let got = self.type_name_at(arg);
        self.arg_error(arg, format!("{expected} expected, got {got}"))
    }

    // ── Argument checks ───────────────────────────────────────────────────────

    pub fn check_any(&self, arg: i32) -> Result<(), LuaError> {
        if self.is_none(arg) {
            return Err(self.arg_error(arg, "value expected"));
        }
        Ok(())
    }

    pub fn check_type(&self, arg: i32, tp: LuaType) -> Result<(), LuaError> {
        if self.type_of(arg) != tp {
            return Err(self.type_error(arg, tp.name()));
        }
        Ok(())
    }

    pub fn check_integer(&self, arg: i32) -> Result<i64, LuaError> {
        match self.to_integerx(arg) {
            Some(i) => Ok(i),
            None if self.is_number(arg) => {
                Err(self.arg_error(arg, "number has no integer representation"))
            }
            None => Err(self.type_error(arg, "number")),
        }
    }

    pub fn check_number(&self, arg: i32) -> Result<f64, LuaError> {
        self.to_numberx(arg)
            .ok_or_else(|| self.type_error(arg, "number"))
    }

    pub fn check_string(&mut self, arg: i32) -> Result<String, LuaError> {
        match self.to_stringx(arg) {
            Some(s) => Ok(s),
            None => Err(self.type_error(arg, "string")),
        }
    }

    pub fn opt_integer(&self, arg: i32, default: i64) -> Result<i64, LuaError> {
        if self.is_none_or_nil(arg) {
            Ok(default)
        } else {
            self.check_integer(arg)
        }
    }

    pub fn opt_number(&self, arg: i32, default: f64) -> Result<f64, LuaError> {
        if self.is_none_or_nil(arg) {
            Ok(default)
        } else {
            self.check_number(arg)
        }
    }

    pub fn opt_string(&mut self, arg: i32, default: &str) -> Result<String, LuaError> {
        if self.is_none_or_nil(arg) {
            Ok(default.to_string())
        } else {
            self.check_string(arg)
        }
    }

    pub fn type_name_at(&self, idx: i32) -> &'static str {
        self.type_of(idx).name()
    }

    // ── Metafields ────────────────────────────────────────────────────────────

    /// Push field `event` of the metatable of the value at `obj`. Returns its
    /// type, or `LuaType::Nil` (pushing nothing) when there is none.
    pub fn get_metafield(&mut self, obj: i32, event: &str) -> Result<LuaType, LuaError> {
        let val = self.get(obj)?;
        let field = self.metamethod(&val, event);
        if field.is_nil() {
            return Ok(LuaType::Nil);
        }
        let tp = field.lua_type();
        self.push(field);
        Ok(tp)
    }

    /// Call metamethod `event` of the value at `obj` with that value as its
    /// only argument, pushing one result. Returns `false` when there is none.
    pub fn call_meta(&mut self, obj: i32, event: &str) -> Result<bool, LuaError> {
        let obj = self.abs_index(obj)?;
        if self.get_metafield(obj, event)? == LuaType::Nil {
            return Ok(false);
        }
        self.push_value(obj)?;
        self.call(1, 1)?;
        Ok(true)
    }

    /// `tostring` conversion, honouring `__tostring`.
    pub fn to_string_meta(&mut self, idx: i32) -> Result<String, LuaError> {
        if self.call_meta(idx, "__tostring")? {
            let s = self.to_stringx(-1);
            self.pop(1)?;
            return s.ok_or_else(|| self.error_message("'__tostring' must return a string"));
        }
        Ok(self.to_value(idx).to_string())
    }

    /// `#v` as an integer, honouring `__len`.
    pub fn len_of(&mut self, idx: i32) -> Result<i64, LuaError> {
        self.len(idx)?;
        let n = self.to_integerx(-1);
        self.pop(1)?;
        n.ok_or_else(|| self.error_message("object length is not an integer"))
    }

    // ── Libraries ─────────────────────────────────────────────────────────────

    /// Ensure `t[name]` is a table for the table at `idx` and push it.
    /// Returns `true` if it already existed.
    pub fn get_sub_table(&mut self, idx: i32, name: &str) -> Result<bool, LuaError> {
        let idx = self.abs_index(idx)?;
        if self.get_field(idx, name)? == LuaType::Table {
            return Ok(true);
        }
        self.pop(1)?;
        self.new_table();
        self.push_value(-1)?;
        self.set_field(idx, name)?;
        Ok(false)
    }

    /// Push a new table holding `funcs`.
    pub fn new_lib(&mut self, funcs: &[(&str, HostFunction)]) -> Result<(), LuaError> {
        self.create_table(0, funcs.len() as i32);
        for (name, f) in funcs {
            self.push_host_function(*f);
            self.set_field(-2, name)?;
        }
        Ok(())
    }

    /// Open module `name` with `open` unless `_LOADED[name]` is already set,
    /// leaving the module on the stack. With `global`, also store it in the
    /// global `name`.
    pub fn require_f(&mut self, name: &str, open: HostFunction, global: bool) -> Result<(), LuaError> {
        self.get_sub_table(LUA_REGISTRY_INDEX, LOADED_TABLE)?;
        self.get_field(-1, name)?;
        if !self.to_boolean(-1) {
            self.pop(1)?;
            self.push_host_function(open);
            self.push_string(name);
            self.call(1, 1)?;
            self.push_value(-1)?;
            self.set_field(-3, name)?;
        }
        self.remove(-2)?;
        if global {
            self.push_value(-1)?;
            self.set_global(name)?;
        }
        Ok(())
    }

    /// Open every library carried by this crate.
    pub fn open_libs(&mut self) -> Result<(), LuaError> {
        for (name, open) in stdlib::LIBS {
            self.require_f(name, *open, true)?;
            self.pop(1)?;
        }
        debug!(target: "lua::vm", "standard libraries opened");
        Ok(())
    }

    /// Load and run a binary chunk, keeping its results on the stack.
    pub fn do_chunk(&mut self, chunk: &[u8], chunk_name: &str) -> Result<(), LuaError> {
        if self.load(chunk, chunk_name, "b") != ThreadStatus::Ok {
            return Err(self.error());
        }
        self.call(0, LUA_MULTRET)
    }
}
