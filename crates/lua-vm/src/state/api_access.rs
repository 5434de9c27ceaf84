use std::sync::Arc;

use lua_core::Number;

use crate::closure::{FunctionBody, HostFunction};
use crate::coroutine::Coroutine;
use crate::state::LuaState;
use crate::value::{LuaType, LuaValue};

// Access functions never fail: an invalid or empty index reads as "no value".

impl LuaState {
    fn peek(&self, idx: i32) -> Option<LuaValue> {
        self.value_at(idx).ok().flatten()
    }

    pub fn type_of(&self, idx: i32) -> LuaType {
        self.peek(idx).map_or(LuaType::None, |v| v.lua_type())
    }

    pub fn type_name(&self, tp: LuaType) -> &'static str {
        tp.name()
    }

    pub fn is_none(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::None
    }

    pub fn is_nil(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Nil
    }

    pub fn is_none_or_nil(&self, idx: i32) -> bool {
        matches!(self.type_of(idx), LuaType::None | LuaType::Nil)
    }

    pub fn is_boolean(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Boolean
    }

    pub fn is_integer(&self, idx: i32) -> bool {
        matches!(self.peek(idx), Some(LuaValue::Integer(_)))
    }

    /// Numbers and strings convertible to numbers.
    pub fn is_number(&self, idx: i32) -> bool {
        self.to_numberx(idx).is_some()
    }

    /// Strings and numbers.
    pub fn is_string(&self, idx: i32) -> bool {
        matches!(self.type_of(idx), LuaType::String | LuaType::Number)
    }

    pub fn is_table(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Table
    }

    pub fn is_function(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Function
    }

    pub fn is_host_function(&self, idx: i32) -> bool {
        matches!(self.peek(idx), Some(LuaValue::Function(c)) if c.is_host())
    }

    pub fn is_coroutine(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Thread
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    pub fn to_boolean(&self, idx: i32) -> bool {
        self.peek(idx).is_some_and(|v| v.is_truthy())
    }

    pub fn to_integer(&self, idx: i32) -> i64 {
        self.to_integerx(idx).unwrap_or(0)
    }

    pub fn to_integerx(&self, idx: i32) -> Option<i64> {
        self.peek(idx)?.to_integer()
    }

    pub fn to_number(&self, idx: i32) -> f64 {
        self.to_numberx(idx).unwrap_or(0.0)
    }

    pub fn to_numberx(&self, idx: i32) -> Option<f64> {
        self.peek(idx)?.to_number().map(Number::to_float)
    }

    /// String form of a string or number; empty for anything else.
    pub fn to_string(&self, idx: i32) -> String {
        self.peek(idx)
            .and_then(|v| v.to_lua_string())
            .unwrap_or_default()
    }

    /// String form of a string or number. A number is converted in place, as
    /// `lua_tolstring` does.
    pub fn to_stringx(&mut self, idx: i32) -> Option<String> {
        let val = self.peek(idx)?;
        let s = val.to_lua_string()?;
        if matches!(val, LuaValue::Integer(_) | LuaValue::Float(_)) {
            self.set(idx, LuaValue::LuaString(s.clone())).ok()?;
        }
        Some(s)
    }

    pub fn to_value(&self, idx: i32) -> LuaValue {
        self.peek(idx).unwrap_or(LuaValue::Nil)
    }

    pub fn to_host_function(&self, idx: i32) -> Option<HostFunction> {
        match self.peek(idx)? {
            LuaValue::Function(c) => match c.body {
                FunctionBody::Host(f) => Some(f),
                FunctionBody::Lua(_) => None,
            },
            _ => None,
        }
    }

    pub fn to_coroutine(&self, idx: i32) -> Option<Arc<Coroutine>> {
        match self.peek(idx)? {
            LuaValue::Coroutine(co) => Some(co),
            _ => None,
        }
    }

    pub fn raw_equal(&self, idx1: i32, idx2: i32) -> bool {
        match (self.peek(idx1), self.peek(idx2)) {
            (Some(a), Some(b)) => a.raw_equals(&b),
            _ => false,
        }
    }

    /// Length without metamethods: string byte length, table border, else 0.
    pub fn raw_len(&self, idx: i32) -> usize {
        match self.peek(idx) {
            Some(LuaValue::LuaString(s)) => s.len(),
            Some(LuaValue::Table(t)) => t.read().length() as usize,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::state::LuaState;
    use crate::value::{LuaType, LuaValue};

    #[test]
    fn type_queries() {
        let mut state = LuaState::new();
        state.push_integer(1);
        state.push_string("2.5");
        state.push_nil();
        assert!(state.is_integer(1));
        assert!(state.is_number(2));
        assert!(!state.is_integer(2));
        assert!(state.is_string(1));
        assert!(state.is_none_or_nil(3));
        assert!(state.is_none(4));
        assert!(!state.is_nil(4));
        assert_eq!(state.type_of(0), LuaType::None);
        assert_eq!(state.type_name(state.type_of(2)), "string");
    }

    #[test]
    fn number_conversions() {
        let mut state = LuaState::new();
        state.push_string("0x10");
        state.push_number(3.0);
        state.push_number(3.5);
        state.push_boolean(true);
        assert_eq!(state.to_integerx(1), Some(16));
        assert_eq!(state.to_integerx(2), Some(3));
        assert_eq!(state.to_integerx(3), None);
        assert_eq!(state.to_numberx(4), None);
        assert_eq!(state.to_integer(4), 0);
    }

    #[test]
    fn to_stringx_converts_numbers_in_place() {
        let mut state = LuaState::new();
        state.push_integer(42);
        state.push_number(1.5);
        state.push(LuaValue::new_table());
        assert_eq!(state.to_stringx(1).as_deref(), Some("42"));
        assert_eq!(state.type_of(1), LuaType::String);
        assert_eq!(state.to_string(2), "1.5");
        assert_eq!(state.to_stringx(3), None);
    }

    #[test]
    fn raw_equal_and_raw_len() {
        let mut state = LuaState::new();
        state.push_integer(1);
        state.push_number(1.0);
        state.push_string("abc");
        assert!(state.raw_equal(1, 2));
        assert!(!state.raw_equal(1, 9));
        assert_eq!(state.raw_len(3), 3);
        assert_eq!(state.raw_len(1), 0);
    }
}
