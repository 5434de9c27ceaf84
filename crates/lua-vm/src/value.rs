use std::cmp::Ordering;
use std::sync::Arc;

use lua_core::number::{cmp_int_float, float_to_integer, format_float, parse_number};
use lua_core::{Constant, Number};
use parking_lot::RwLock;

use crate::closure::LuaClosure;
use crate::coroutine::Coroutine;
use crate::table::LuaTable;

/// Shared handle to a table.
pub type TableRef = Arc<RwLock<LuaTable>>;

/// All Lua value types, mirroring the Lua 5.3 type system.
#[derive(Clone)]
pub enum LuaValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    LuaString(String),
    /// A Lua or host closure plus its captured upvalues.
    Function(Arc<LuaClosure>),
    /// A Lua table (array + hash parts, reference-counted + interior mutability).
    Table(TableRef),
    /// A coroutine handle.
    Coroutine(Arc<Coroutine>),
}

/// Basic type tags, as reported by `type()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaType {
    /// An acceptable stack index above the top.
    None,
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    Thread,
}

impl LuaType {
    /// Number of real value types (everything except `None`).
    pub const COUNT: usize = 7;

    pub fn name(self) -> &'static str {
        match self {
            LuaType::None => "no value",
            LuaType::Nil => "nil",
            LuaType::Boolean => "boolean",
            LuaType::Number => "number",
            LuaType::String => "string",
            LuaType::Table => "table",
            LuaType::Function => "function",
            LuaType::Thread => "thread",
        }
    }

    /// Slot of this type in per-type side tables; `None` has no slot.
    pub fn tag(self) -> Option<usize> {
        match self {
            LuaType::None => None,
            LuaType::Nil => Some(0),
            LuaType::Boolean => Some(1),
            LuaType::Number => Some(2),
            LuaType::String => Some(3),
            LuaType::Table => Some(4),
            LuaType::Function => Some(5),
            LuaType::Thread => Some(6),
        }
    }
}

impl LuaValue {
    pub fn lua_type(&self) -> LuaType {
        match self {
            LuaValue::Nil => LuaType::Nil,
            LuaValue::Boolean(_) => LuaType::Boolean,
            LuaValue::Integer(_) | LuaValue::Float(_) => LuaType::Number,
            LuaValue::LuaString(_) => LuaType::String,
            LuaValue::Function(_) => LuaType::Function,
            LuaValue::Table(_) => LuaType::Table,
            LuaValue::Coroutine(_) => LuaType::Thread,
        }
    }

    /// Returns the Lua type name string as per the reference manual.
    pub fn type_name(&self) -> &'static str {
        self.lua_type().name()
    }

    /// Returns `true` if the value is truthy in Lua's sense
    /// (everything except `nil` and `false` is truthy).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    /// Create a new empty table value.
    pub fn new_table() -> Self {
        LuaValue::Table(Arc::new(RwLock::new(LuaTable::new())))
    }

    pub fn string(s: impl Into<String>) -> Self {
        LuaValue::LuaString(s.into())
    }

    // ── Coercions ─────────────────────────────────────────────────────────────

    /// Numeric view of the value: numbers as-is, numeric strings parsed.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            LuaValue::Integer(i) => Some(Number::Integer(*i)),
            LuaValue::Float(f) => Some(Number::Float(*f)),
            LuaValue::LuaString(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<f64> {
        self.to_number().map(Number::to_float)
    }

    /// Integer view: integers, floats with an exact integer value, and
    /// strings that convert to either.
    pub fn to_integer(&self) -> Option<i64> {
        match self.to_number()? {
            Number::Integer(i) => Some(i),
            Number::Float(f) => float_to_integer(f),
        }
    }

    /// String view: strings as-is and numbers formatted the way `tostring` does.
    pub fn to_lua_string(&self) -> Option<String> {
        match self {
            LuaValue::LuaString(s) => Some(s.clone()),
            LuaValue::Integer(n) => Some(n.to_string()),
            LuaValue::Float(f) => Some(format_float(*f)),
            _ => None,
        }
    }

    /// Raw equality: numbers by value, strings by content, everything else by
    /// identity.
    pub fn raw_equals(&self, other: &LuaValue) -> bool {
        self == other
    }
}

impl From<Number> for LuaValue {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => LuaValue::Integer(i),
            Number::Float(f) => LuaValue::Float(f),
        }
    }
}

impl From<&Constant> for LuaValue {
    fn from(k: &Constant) -> Self {
        match k {
            Constant::Nil => LuaValue::Nil,
            Constant::Boolean(b) => LuaValue::Boolean(*b),
            Constant::Integer(i) => LuaValue::Integer(*i),
            Constant::Float(f) => LuaValue::Float(*f),
            Constant::String(s) => LuaValue::LuaString(s.clone()),
        }
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Float(b)) | (LuaValue::Float(b), LuaValue::Integer(a)) => {
                cmp_int_float(*a, *b) == Some(Ordering::Equal)
            }
            (LuaValue::LuaString(a), LuaValue::LuaString(b)) => a == b,
            // Closures, tables and coroutines are equal only to themselves
            (LuaValue::Function(a), LuaValue::Function(b)) => Arc::ptr_eq(a, b),
            (LuaValue::Table(a), LuaValue::Table(b)) => Arc::ptr_eq(a, b),
            (LuaValue::Coroutine(a), LuaValue::Coroutine(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "LuaValue::Nil"),
            LuaValue::Boolean(b) => write!(f, "LuaValue::Boolean({b})"),
            LuaValue::Integer(n) => write!(f, "LuaValue::Integer({n})"),
            LuaValue::Float(n) => write!(f, "LuaValue::Float({n})"),
            LuaValue::LuaString(s) => write!(f, "LuaValue::LuaString({s:?})"),
            LuaValue::Function(c) => write!(f, "LuaValue::Function({:p})", Arc::as_ptr(c)),
            LuaValue::Table(t) => write!(f, "LuaValue::Table({:p})", Arc::as_ptr(t)),
            LuaValue::Coroutine(c) => write!(f, "LuaValue::Coroutine({:p})", Arc::as_ptr(c)),
        }
    }
}

impl std::fmt::Display for LuaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{b}"),
            LuaValue::Integer(n) => write!(f, "{n}"),
            LuaValue::Float(n) => f.write_str(&format_float(*n)),
            LuaValue::LuaString(s) => write!(f, "{s}"),
            LuaValue::Function(c) if c.is_host() => write!(f, "builtin: {:p}", Arc::as_ptr(c)),
            LuaValue::Function(c) => write!(f, "function: {:p}", Arc::as_ptr(c)),
            LuaValue::Table(t) => write!(f, "table: {:p}", Arc::as_ptr(t)),
            LuaValue::Coroutine(c) => write!(f, "thread: {:p}", Arc::as_ptr(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_falsy() {
        assert!(!LuaValue::Nil.is_truthy());
    }

    #[test]
    fn false_is_falsy() {
        assert!(!LuaValue::Boolean(false).is_truthy());
    }

    #[test]
    fn zero_integer_is_truthy() {
        // In Lua, 0 is truthy!
        assert!(LuaValue::Integer(0).is_truthy());
        assert!(LuaValue::string("").is_truthy());
    }

    #[test]
    fn type_names() {
        assert_eq!(LuaValue::Nil.type_name(), "nil");
        assert_eq!(LuaValue::Boolean(true).type_name(), "boolean");
        assert_eq!(LuaValue::Integer(1).type_name(), "number");
        assert_eq!(LuaValue::Float(1.0).type_name(), "number");
        assert_eq!(LuaValue::string("hi").type_name(), "string");
        assert_eq!(LuaValue::new_table().type_name(), "table");
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(LuaValue::Integer(1), LuaValue::Float(1.0));
        assert_ne!(LuaValue::Integer(1), LuaValue::Float(1.5));
        assert_ne!(LuaValue::Integer(1), LuaValue::string("1"));
        let big = 1i64 << 53;
        assert_ne!(LuaValue::Integer(big + 1), LuaValue::Float(big as f64));
        assert_eq!(LuaValue::Float(big as f64), LuaValue::Integer(big));
    }

    #[test]
    fn table_reference_equality() {
        let t1 = LuaValue::new_table();
        let t2 = LuaValue::new_table();
        assert_eq!(t1, t1.clone()); // same Arc → equal
        assert_ne!(t1, t2); // different Arcs → not equal
    }

    // ── Coercions ────────────────────────────────────────────────────────────

    #[test]
    fn string_to_number_coercion() {
        assert_eq!(LuaValue::string("10").to_integer(), Some(10));
        assert_eq!(LuaValue::string(" 2.5 ").to_float(), Some(2.5));
        assert_eq!(LuaValue::string("3.0").to_integer(), Some(3));
        assert_eq!(LuaValue::string("abc").to_float(), None);
        assert_eq!(LuaValue::Float(2.5).to_integer(), None);
        assert_eq!(LuaValue::new_table().to_float(), None);
    }

    #[test]
    fn number_to_string_coercion() {
        assert_eq!(LuaValue::Integer(42).to_lua_string().as_deref(), Some("42"));
        assert_eq!(LuaValue::Float(1.0).to_lua_string().as_deref(), Some("1.0"));
        assert_eq!(LuaValue::Boolean(true).to_lua_string(), None);
    }

    #[test]
    fn display_matches_tostring() {
        assert_eq!(LuaValue::Float(0.1).to_string(), "0.1");
        assert_eq!(LuaValue::Float(1e100).to_string(), "1e+100");
        assert!(LuaValue::new_table().to_string().starts_with("table: 0x"));
    }
}
