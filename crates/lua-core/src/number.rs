//! Numeric conversions and the integer/float operator rules shared by the VM
//! and the chunk tooling.

use std::cmp::Ordering;

/// A parsed numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn to_float(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Exact float → integer conversion; `None` when `f` has a fractional part or
/// lies outside the `i64` range.
pub fn float_to_integer(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.floor() == f && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

/// Exact ordering of an integer against a float, without rounding the
/// integer; `None` when `f` is NaN.
pub fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    match i.cmp(&(floor as i64)) {
        Ordering::Equal if f > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}

/// Parse an integer literal: optional sign, decimal or `0x` hexadecimal.
/// Decimal overflow yields `None` (the caller falls back to a float);
/// hexadecimal wraps around like the reference implementation.
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if body.is_empty() {
        return None;
    }
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        let mut acc: i64 = 0;
        for ch in hex.chars() {
            let d = ch.to_digit(16)? as i64;
            acc = acc.wrapping_mul(16).wrapping_add(d);
        }
        acc
    } else {
        if !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude: i64 = match body.parse::<i64>() {
            Ok(n) => n,
            // "-9223372036854775808" does not fit as a positive magnitude
            Err(_) if neg && body == "9223372036854775808" => return Some(i64::MIN),
            Err(_) => return None,
        };
        magnitude
    };
    Some(if neg { value.wrapping_neg() } else { value })
}

/// Parse a decimal float literal. Rejects `inf`/`nan` spellings that Rust's
/// parser would otherwise accept.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let valid = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid || !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Lua `tonumber` rules for strings: integer syntax first, then float.
pub fn parse_number(s: &str) -> Option<Number> {
    if let Some(i) = parse_integer(s) {
        return Some(Number::Integer(i));
    }
    parse_float(s).map(Number::Float)
}

// ── Integer / float operators ─────────────────────────────────────────────────

/// Floor division on integers. The caller rejects `b == 0`.
pub fn i_floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

pub fn f_floor_div(a: f64, b: f64) -> f64 {
    (a / b).floor()
}

/// Integer modulo with the sign of the divisor. The caller rejects `b == 0`.
pub fn i_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

pub fn f_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if (r > 0.0 && b < 0.0) || (r < 0.0 && b > 0.0) {
        r + b
    } else {
        r
    }
}

/// Logical left shift; negative counts shift right, counts ≥ 64 clear.
pub fn shift_left(a: i64, n: i64) -> i64 {
    if n < 0 {
        shift_right(a, n.wrapping_neg())
    } else if n >= 64 {
        0
    } else {
        ((a as u64) << n) as i64
    }
}

/// Logical right shift; negative counts shift left, counts ≥ 64 clear.
pub fn shift_right(a: i64, n: i64) -> i64 {
    if n < 0 {
        shift_left(a, n.wrapping_neg())
    } else if n >= 64 {
        0
    } else {
        ((a as u64) >> n) as i64
    }
}

// ── Table size hints ──────────────────────────────────────────────────────────

/// Encode a size as a "floating point byte" (`eeeeexxx`), rounding up.
pub fn int2fb(mut x: usize) -> i32 {
    let mut e = 0;
    if x < 8 {
        return x as i32;
    }
    while x >= 8 << 4 {
        x = (x + 0xf) >> 4;
        e += 4;
    }
    while x >= 8 << 1 {
        x = (x + 1) >> 1;
        e += 1;
    }
    ((e + 1) << 3) | (x as i32 - 8)
}

/// Decode a "floating point byte".
pub fn fb2int(x: i32) -> usize {
    if x < 8 {
        x.max(0) as usize
    } else {
        (((x & 7) + 8) as usize) << ((x >> 3) - 1)
    }
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Format a float the way `tostring` does (`%.14g`), keeping a trailing `.0`
/// on integral values so floats stay distinguishable from integers.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format_g14(f);
    if s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        format!("{s}.0")
    } else {
        s
    }
}

fn format_g14(f: f64) -> String {
    const PRECISION: i32 = 14;
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    // `{:e}` rounds to the requested significant digits and reports the
    // exponent after rounding.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if exp < -4 || exp >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
