use std::sync::Arc;

use tracing::trace;

use crate::arith::{arith, arith_error, raw_less_equal, raw_less_than, ArithOp, CompareOp};
use crate::error::LuaError;
use crate::state::LuaState;
use crate::value::{LuaValue, TableRef};

// ── Metamethod lookup ─────────────────────────────────────────────────────────

impl LuaState {
    pub(crate) fn metatable_of(&self, val: &LuaValue) -> Option<TableRef> {
        match val {
            LuaValue::Table(t) => t.read().metatable(),
            other => {
                let tag = other.lua_type().tag()?;
                self.global.type_metatables.read()[tag].clone()
            }
        }
    }

    /// The `event` field of `val`'s metatable, or nil.
    pub(crate) fn metamethod(&self, val: &LuaValue, event: &str) -> LuaValue {
        self.metatable_of(val)
            .map_or(LuaValue::Nil, |mt| mt.read().get_str(event))
    }

    /// Call `mm` with `args` and keep its first result.
    pub(crate) fn call_metamethod(
        &mut self,
        mm: LuaValue,
        args: Vec<LuaValue>,
    ) -> Result<LuaValue, LuaError> {
        let mut results = self.call_value(mm, args, 1)?;
        Ok(results.pop().unwrap_or(LuaValue::Nil))
    }

    /// Try `event` on `a`, then on `b`. `None` when neither has it.
    fn binary_metamethod(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
        event: &'static str,
    ) -> Result<Option<LuaValue>, LuaError> {
        let mut mm = self.metamethod(a, event);
        if mm.is_nil() {
            mm = self.metamethod(b, event);
        }
        if mm.is_nil() {
            return Ok(None);
        }
        trace!(target: "lua::vm", event, "metamethod dispatch");
        self.call_metamethod(mm, vec![a.clone(), b.clone()]).map(Some)
    }

    // ── Value-level operators ─────────────────────────────────────────────────

    pub(crate) fn arith_values(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
        op: ArithOp,
    ) -> Result<LuaValue, LuaError> {
        if let Some(result) = arith(a, b, op)? {
            return Ok(result);
        }
        self.binary_metamethod(a, b, op.metamethod())?
            .ok_or_else(|| arith_error(a, b, op))
    }

    /// `a == b`; `__eq` is consulted only for two distinct tables.
    pub(crate) fn values_equal(&mut self, a: &LuaValue, b: &LuaValue) -> Result<bool, LuaError> {
        match (a, b) {
            (LuaValue::Table(x), LuaValue::Table(y)) if !Arc::ptr_eq(x, y) => Ok(self
                .binary_metamethod(a, b, "__eq")?
                .is_some_and(|v| v.is_truthy())),
            _ => Ok(a.raw_equals(b)),
        }
    }

    pub(crate) fn less_than(&mut self, a: &LuaValue, b: &LuaValue) -> Result<bool, LuaError> {
        if let Some(result) = raw_less_than(a, b) {
            return Ok(result);
        }
        match self.binary_metamethod(a, b, "__lt")? {
            Some(v) => Ok(v.is_truthy()),
            None => Err(compare_error(a, b)),
        }
    }

    /// `a <= b`, falling back from `__le` to `not (b < a)`.
    pub(crate) fn less_equal(&mut self, a: &LuaValue, b: &LuaValue) -> Result<bool, LuaError> {
        if let Some(result) = raw_less_equal(a, b) {
            return Ok(result);
        }
        if let Some(v) = self.binary_metamethod(a, b, "__le")? {
            return Ok(v.is_truthy());
        }
        match self.binary_metamethod(b, a, "__lt")? {
            Some(v) => Ok(!v.is_truthy()),
            None => Err(compare_error(a, b)),
        }
    }

    pub(crate) fn length_of(&mut self, val: &LuaValue) -> Result<LuaValue, LuaError> {
        if let LuaValue::LuaString(s) = val {
            return Ok(LuaValue::Integer(s.len() as i64));
        }
        let mm = self.metamethod(val, "__len");
        if !mm.is_nil() {
            return self.call_metamethod(mm, vec![val.clone(), val.clone()]);
        }
        match val {
            LuaValue::Table(t) => Ok(LuaValue::Integer(t.read().length())),
            other => Err(LuaError::Length(other.type_name())),
        }
    }

    pub(crate) fn concat_values(&mut self, a: &LuaValue, b: &LuaValue) -> Result<LuaValue, LuaError> {
        if let (Some(x), Some(y)) = (a.to_lua_string(), b.to_lua_string()) {
            return Ok(LuaValue::LuaString(x + &y));
        }
        match self.binary_metamethod(a, b, "__concat")? {
            Some(v) => Ok(v),
            None => {
                let culprit = if a.to_lua_string().is_some() { b } else { a };
                Err(LuaError::Concat(culprit.type_name()))
            }
        }
    }

    // ── Stack API ─────────────────────────────────────────────────────────────

    /// Pop the operands of `op` (one for unary operators, two otherwise) and
    /// push the result.
    pub fn arith(&mut self, op: ArithOp) -> Result<(), LuaError> {
        let b = self.pop_value()?;
        let a = if op.is_unary() { b.clone() } else { self.pop_value()? };
        let result = self.arith_values(&a, &b, op)?;
        self.push(result);
        Ok(())
    }

    /// Compare the values at two indices. An invalid index compares false.
    pub fn compare(&mut self, idx1: i32, idx2: i32, op: CompareOp) -> Result<bool, LuaError> {
        let a = self.value_at(idx1).ok().flatten();
        let b = self.value_at(idx2).ok().flatten();
        let (Some(a), Some(b)) = (a, b) else {
            return Ok(false);
        };
        match op {
            CompareOp::Eq => self.values_equal(&a, &b),
            CompareOp::Lt => self.less_than(&a, &b),
            CompareOp::Le => self.less_equal(&a, &b),
        }
    }

    /// Push `#v` for the value at `idx`.
    pub fn len(&mut self, idx: i32) -> Result<(), LuaError> {
        let val = self.get(idx)?;
        let result = self.length_of(&val)?;
        self.push(result);
        Ok(())
    }

    /// Pop `n` values and push their concatenation (right-associative).
    pub fn concat(&mut self, n: i32) -> Result<(), LuaError> {
        match n {
            0 => self.push_string(""),
            1 => {}
            n if n > 1 => {
                for _ in 1..n {
                    let b = self.pop_value()?;
                    let a = self.pop_value()?;
                    let joined = self.concat_values(&a, &b)?;
                    self.push(joined);
                }
            }
            _ => return Err(LuaError::Stack(format!("cannot concatenate {n} values"))),
        }
        Ok(())
    }
}

fn compare_error(a: &LuaValue, b: &LuaValue) -> LuaError {
    LuaError::Compare {
        lhs: a.type_name(),
        rhs: b.type_name(),
    }
}
