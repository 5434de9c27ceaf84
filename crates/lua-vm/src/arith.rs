//! Native arithmetic and ordering on values. Metamethod fallback lives in
//! the state layer, which calls these first.

use std::cmp::Ordering;

use lua_core::number::{cmp_int_float, f_floor_div, f_mod, i_floor_div, i_mod, shift_left, shift_right};
use lua_core::{Number, OpCode};

use crate::error::LuaError;
use crate::value::LuaValue;

// ── Operators ─────────────────────────────────────────────────────────────────

/// Arithmetic and bitwise operators, in `lua_arith` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
}

/// Comparison operators, in `lua_compare` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
}

impl ArithOp {
    /// Name of the metamethod consulted when the operands are not numbers.
    pub fn metamethod(self) -> &'static str {
        match self {
            ArithOp::Add => "__add",
            ArithOp::Sub => "__sub",
            ArithOp::Mul => "__mul",
            ArithOp::Mod => "__mod",
            ArithOp::Pow => "__pow",
            ArithOp::Div => "__div",
            ArithOp::IDiv => "__idiv",
            ArithOp::BAnd => "__band",
            ArithOp::BOr => "__bor",
            ArithOp::BXor => "__bxor",
            ArithOp::Shl => "__shl",
            ArithOp::Shr => "__shr",
            ArithOp::Unm => "__unm",
            ArithOp::BNot => "__bnot",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, ArithOp::Unm | ArithOp::BNot)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr | ArithOp::BNot
        )
    }

    pub fn from_opcode(op: OpCode) -> Option<ArithOp> {
        Some(match op {
            OpCode::Add => ArithOp::Add,
            OpCode::Sub => ArithOp::Sub,
            OpCode::Mul => ArithOp::Mul,
            OpCode::Mod => ArithOp::Mod,
            OpCode::Pow => ArithOp::Pow,
            OpCode::Div => ArithOp::Div,
            OpCode::IDiv => ArithOp::IDiv,
            OpCode::BAnd => ArithOp::BAnd,
            OpCode::BOr => ArithOp::BOr,
            OpCode::BXor => ArithOp::BXor,
            OpCode::Shl => ArithOp::Shl,
            OpCode::Shr => ArithOp::Shr,
            OpCode::Unm => ArithOp::Unm,
            OpCode::BNot => ArithOp::BNot,
            _ => return None,
        })
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

/// Apply `op` natively. `Ok(None)` means the operands are not numbers (or,
/// for bitwise operators, have no integer representation) and the caller
/// should try a metamethod. Unary operators ignore `b`.
pub fn arith(a: &LuaValue, b: &LuaValue, op: ArithOp) -> Result<Option<LuaValue>, LuaError> {
    if op.is_bitwise() {
        let (Some(x), Some(y)) = (a.to_integer(), b.to_integer()) else {
            return Ok(None);
        };
        return Ok(Some(LuaValue::Integer(bitwise(op, x, y))));
    }
    let (Some(x), Some(y)) = (a.to_number(), b.to_number()) else {
        return Ok(None);
    };
    let result = match (op, x, y) {
        (ArithOp::Div, x, y) => LuaValue::Float(x.to_float() / y.to_float()),
        (ArithOp::Pow, x, y) => LuaValue::Float(x.to_float().powf(y.to_float())),
        (op, Number::Integer(x), Number::Integer(y)) => LuaValue::Integer(integer_op(op, x, y)?),
        (op, x, y) => LuaValue::Float(float_op(op, x.to_float(), y.to_float())),
    };
    Ok(Some(result))
}

fn integer_op(op: ArithOp, x: i64, y: i64) -> Result<i64, LuaError> {
    Ok(match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Mod => {
            if y == 0 {
                return Err(LuaError::DivideByZero("%"));
            }
            i_mod(x, y)
        }
        ArithOp::IDiv => {
            if y == 0 {
                return Err(LuaError::DivideByZero("//"));
            }
            i_floor_div(x, y)
        }
        ArithOp::Unm => x.wrapping_neg(),
        other => {
            return Err(LuaError::Internal(format!(
                "{other:?} has no integer form"
            )))
        }
    })
}

fn float_op(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Mod => f_mod(x, y),
        ArithOp::IDiv => f_floor_div(x, y),
        ArithOp::Unm => -x,
        ArithOp::Pow => x.powf(y),
        _ => x / y,
    }
}

fn bitwise(op: ArithOp, x: i64, y: i64) -> i64 {
    match op {
        ArithOp::BAnd => x & y,
        ArithOp::BOr => x | y,
        ArithOp::BXor => x ^ y,
        ArithOp::Shl => shift_left(x, y),
        ArithOp::Shr => shift_right(x, y),
        _ => !x,
    }
}

/// The error to raise when neither operand has a usable metamethod.
pub fn arith_error(a: &LuaValue, b: &LuaValue, op: ArithOp) -> LuaError {
    let numeric = |v: &LuaValue| v.to_number().is_some();
    if op.is_bitwise() && numeric(a) && numeric(b) {
        return LuaError::NoIntegerRepresentation;
    }
    let culprit = if numeric(a) { b } else { a };
    LuaError::Arithmetic {
        got: culprit.type_name(),
    }
}

// ── Ordering ──────────────────────────────────────────────────────────────────

/// `a < b` for numbers and strings; `None` when a metamethod is needed.
pub fn raw_less_than(a: &LuaValue, b: &LuaValue) -> Option<bool> {
    Some(match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => x < y,
        (LuaValue::Float(x), LuaValue::Float(y)) => x < y,
        (LuaValue::Integer(x), LuaValue::Float(y)) => cmp_int_float(*x, *y) == Some(Ordering::Less),
        (LuaValue::Float(x), LuaValue::Integer(y)) => cmp_int_float(*y, *x) == Some(Ordering::Greater),
        (LuaValue::LuaString(x), LuaValue::LuaString(y)) => x < y,
        _ => return None,
    })
}

/// `a <= b` for numbers and strings; `None` when a metamethod is needed.
pub fn raw_less_equal(a: &LuaValue, b: &LuaValue) -> Option<bool> {
    Some(match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => x <= y,
        (LuaValue::Float(x), LuaValue::Float(y)) => x <= y,
        (LuaValue::Integer(x), LuaValue::Float(y)) => {
            matches!(cmp_int_float(*x, *y), Some(Ordering::Less | Ordering::Equal))
        }
        (LuaValue::Float(x), LuaValue::Integer(y)) => {
            matches!(cmp_int_float(*y, *x), Some(Ordering::Greater | Ordering::Equal))
        }
        (LuaValue::LuaString(x), LuaValue::LuaString(y)) => x <= y,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> LuaValue {
        LuaValue::Integer(i)
    }

    fn flt(f: f64) -> LuaValue {
        LuaValue::Float(f)
    }

    fn eval(a: LuaValue, b: LuaValue, op: ArithOp) -> LuaValue {
        arith(&a, &b, op).unwrap().unwrap()
    }

    // ── Integer / float selection ────────────────────────────────────────────

    #[test]
    fn integer_operands_stay_integer() {
        assert!(matches!(eval(int(2), int(3), ArithOp::Add), LuaValue::Integer(5)));
        assert!(matches!(eval(int(7), int(2), ArithOp::IDiv), LuaValue::Integer(3)));
        assert!(matches!(eval(int(-7), int(2), ArithOp::Mod), LuaValue::Integer(1)));
        assert!(matches!(eval(int(i64::MAX), int(1), ArithOp::Add), LuaValue::Integer(i64::MIN)));
    }

    #[test]
    fn mixed_operands_become_float() {
        assert!(matches!(eval(int(2), flt(0.5), ArithOp::Mul), LuaValue::Float(f) if f == 1.0));
        assert!(matches!(eval(flt(7.0), int(2), ArithOp::IDiv), LuaValue::Float(f) if f == 3.0));
    }

    #[test]
    fn division_and_power_are_always_float() {
        assert!(matches!(eval(int(6), int(3), ArithOp::Div), LuaValue::Float(f) if f == 2.0));
        assert!(matches!(eval(int(2), int(10), ArithOp::Pow), LuaValue::Float(f) if f == 1024.0));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        assert!(matches!(eval(LuaValue::string("10"), int(1), ArithOp::Add), LuaValue::Integer(11)));
        assert!(matches!(eval(LuaValue::string("1.5"), int(1), ArithOp::Add), LuaValue::Float(f) if f == 2.5));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert_eq!(arith(&int(1), &int(0), ArithOp::IDiv), Err(LuaError::DivideByZero("//")));
        assert_eq!(arith(&int(1), &int(0), ArithOp::Mod), Err(LuaError::DivideByZero("%")));
        assert!(matches!(eval(flt(1.0), int(0), ArithOp::IDiv), LuaValue::Float(f) if f.is_infinite()));
    }

    // ── Bitwise ──────────────────────────────────────────────────────────────

    #[test]
    fn bitwise_needs_integer_representation() {
        assert_eq!(eval(int(6), int(3), ArithOp::BAnd), int(2));
        assert_eq!(eval(flt(6.0), int(3), ArithOp::BOr), int(7));
        assert_eq!(eval(int(1), int(4), ArithOp::Shl), int(16));
        assert_eq!(eval(int(0), int(0), ArithOp::BNot), int(-1));
        assert_eq!(arith(&flt(1.5), &int(1), ArithOp::BAnd), Ok(None));
        assert_eq!(
            arith_error(&flt(1.5), &int(1), ArithOp::BAnd),
            LuaError::NoIntegerRepresentation
        );
    }

    #[test]
    fn non_numbers_defer_to_metamethods() {
        let t = LuaValue::new_table();
        assert_eq!(arith(&t, &int(1), ArithOp::Add), Ok(None));
        assert_eq!(
            arith_error(&int(1), &LuaValue::Nil, ArithOp::Add),
            LuaError::Arithmetic { got: "nil" }
        );
        assert_eq!(
            arith_error(&t, &int(1), ArithOp::Sub),
            LuaError::Arithmetic { got: "table" }
        );
    }

    // ── Ordering ─────────────────────────────────────────────────────────────

    #[test]
    fn ordering_numbers_and_strings() {
        assert_eq!(raw_less_than(&int(1), &flt(1.5)), Some(true));
        assert_eq!(raw_less_equal(&flt(2.0), &int(2)), Some(true));
        let big = 1i64 << 53;
        assert_eq!(raw_less_than(&flt(big as f64), &int(big + 1)), Some(true));
        assert_eq!(raw_less_equal(&int(big + 1), &flt(big as f64)), Some(false));
        assert_eq!(raw_less_than(&LuaValue::string("a"), &LuaValue::string("b")), Some(true));
        assert_eq!(raw_less_than(&int(1), &LuaValue::string("2")), None);
        assert_eq!(raw_less_equal(&LuaValue::Nil, &LuaValue::Nil), None);
    }

    #[test]
    fn opcode_mapping() {
        assert_eq!(ArithOp::from_opcode(OpCode::IDiv), Some(ArithOp::IDiv));
        assert_eq!(ArithOp::from_opcode(OpCode::Move), None);
        assert_eq!(ArithOp::Shl.metamethod(), "__shl");
        assert!(ArithOp::BNot.is_unary());
    }
}
