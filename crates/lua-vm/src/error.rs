use thiserror::Error;

use crate::value::LuaValue;

/// All errors that can occur within the lua-rust runtime.
#[derive(Debug, Error, PartialEq)]
pub enum LuaError {
    /// An error object raised by `error()` or by a host function.
    #[error("{}", describe_error_object(.0))]
    Runtime(LuaValue),

    /// A host function received an argument it cannot use.
    #[error("bad argument #{arg} ({message})")]
    BadArgument { arg: i32, message: String },

    /// Wrong type used for an operation.
    #[error("{expected} expected, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("attempt to perform arithmetic on a {got} value")]
    Arithmetic { got: &'static str },

    #[error("number has no integer representation")]
    NoIntegerRepresentation,

    /// Integer `//` or `%` with a zero divisor.
    #[error("attempt to perform 'n{0}0'")]
    DivideByZero(&'static str),

    #[error("attempt to compare {lhs} with {rhs}")]
    Compare {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("attempt to concatenate a {0} value")]
    Concat(&'static str),

    #[error("attempt to get length of a {0} value")]
    Length(&'static str),

    #[error("attempt to index a {0} value")]
    Index(&'static str),

    /// A nil or NaN table key.
    #[error("table index is {0}")]
    TableKey(&'static str),

    /// Invalid stack index or stack exhaustion.
    #[error("stack error: {0}")]
    Stack(String),

    #[error("stack overflow")]
    StackOverflow,

    #[error("attempt to call a {0} value")]
    NotCallable(&'static str),

    #[error("{0}")]
    Coroutine(String),

    /// Internal implementation bug or malformed bytecode.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LuaError {
    /// The Lua value a protected call reports for this error.
    pub fn into_value(self) -> LuaValue {
        match self {
            LuaError::Runtime(value) => value,
            other => LuaValue::LuaString(other.to_string()),
        }
    }
}

fn describe_error_object(value: &LuaValue) -> String {
    match value {
        LuaValue::LuaString(s) => s.clone(),
        LuaValue::Integer(_) | LuaValue::Float(_) => value.to_string(),
        LuaValue::Nil => "nil".to_string(),
        other => format!("(error object is a {} value)", other.type_name()),
    }
}
