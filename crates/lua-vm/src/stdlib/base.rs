use crate::closure::HostFunction;
use crate::error::LuaError;
use crate::state::{LuaState, ThreadStatus, LUA_MULTRET};
use crate::stdlib::LUA_VERSION;
use crate::value::{LuaType, LuaValue};

const BASE_FUNCS: &[(&str, HostFunction)] = &[
    ("assert", base_assert),
    ("error", base_error),
    ("getmetatable", base_getmetatable),
    ("ipairs", base_ipairs),
    ("next", base_next),
    ("pairs", base_pairs),
    ("pcall", base_pcall),
    ("print", base_print),
    ("rawequal", base_rawequal),
    ("rawget", base_rawget),
    ("rawlen", base_rawlen),
    ("rawset", base_rawset),
    ("select", base_select),
    ("setmetatable", base_setmetatable),
    ("tonumber", base_tonumber),
    ("tostring", base_tostring),
    ("type", base_type),
    ("xpcall", base_xpcall),
];

/// Install the base functions into the globals table and return it.
pub fn open_base(state: &mut LuaState) -> Result<i32, LuaError> {
    state.push_global_table();
    for (name, f) in BASE_FUNCS {
        state.push_host_function(*f);
        state.set_field(-2, name)?;
    }
    state.push_value(-1)?;
    state.set_field(-2, "_G")?;
    state.push_string(LUA_VERSION);
    state.set_field(-2, "_VERSION")?;
    Ok(1)
}

// ── Output and errors ─────────────────────────────────────────────────────────

fn base_print(state: &mut LuaState) -> Result<i32, LuaError> {
    let n = state.get_top();
    let mut parts = Vec::with_capacity(n as usize);
    for i in 1..=n {
        parts.push(state.to_string_meta(i)?);
    }
    println!("{}", parts.join("\t"));
    Ok(0)
}

fn base_assert(state: &mut LuaState) -> Result<i32, LuaError> {
    if state.to_boolean(1) {
        return Ok(state.get_top());
    }
    state.check_any(1)?;
    if state.is_none(2) {
        return Err(state.error_message("assertion failed!"));
    }
    Err(LuaError::Runtime(state.to_value(2)))
}

fn base_error(state: &mut LuaState) -> Result<i32, LuaError> {
    state.opt_integer(2, 1)?;
    Err(LuaError::Runtime(state.to_value(1)))
}

fn base_pcall(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    state.push_boolean(true);
    state.insert(1)?;
    let status = state.pcall(state.get_top() - 2, LUA_MULTRET, 0);
    finish_pcall(state, status, 0)
}

fn base_xpcall(state: &mut LuaState) -> Result<i32, LuaError> {
    let n = state.get_top();
    state.check_type(2, LuaType::Function)?;
    state.push_boolean(true);
    state.push_value(1)?;
    state.rotate(3, 2)?;
    let status = state.pcall(n - 2, LUA_MULTRET, 2);
    finish_pcall(state, status, 2)
}

/// Results of `pcall`/`xpcall`: `true` plus the results, or `false` plus the
/// error object. `extra` values below the `true` are not results.
fn finish_pcall(state: &mut LuaState, status: ThreadStatus, extra: i32) -> Result<i32, LuaError> {
    if matches!(status, ThreadStatus::Ok | ThreadStatus::Yield) {
        return Ok(state.get_top() - extra);
    }
    state.push_boolean(false);
    state.push_value(-2)?;
    Ok(2)
}

// ── Iteration ─────────────────────────────────────────────────────────────────

fn base_next(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_type(1, LuaType::Table)?;
    state.set_top(2)?;
    if state.next(1)? {
        Ok(2)
    } else {
        state.push_nil();
        Ok(1)
    }
}

fn base_pairs(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    if state.get_metafield(1, "__pairs")? == LuaType::Nil {
        state.push_host_function(base_next);
        state.push_value(1)?;
        state.push_nil();
    } else {
        state.push_value(1)?;
        state.call(1, 3)?;
    }
    Ok(3)
}

fn ipairs_aux(state: &mut LuaState) -> Result<i32, LuaError> {
    let i = state.check_integer(2)?.wrapping_add(1);
    state.push_integer(i);
    if state.get_i(1, i)? == LuaType::Nil {
        Ok(1)
    } else {
        Ok(2)
    }
}

fn base_ipairs(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    state.push_host_function(ipairs_aux);
    state.push_value(1)?;
    state.push_integer(0);
    Ok(3)
}

fn base_select(state: &mut LuaState) -> Result<i32, LuaError> {
    let n = state.get_top();
    if state.type_of(1) == LuaType::String && state.to_string(1) == "#" {
        state.push_integer(i64::from(n - 1));
        return Ok(1);
    }
    let i = state.check_integer(1)?;
    let i = if i < 0 {
        i64::from(n) + i
    } else if i > i64::from(n) {
        i64::from(n)
    } else {
        i
    };
    state.arg_check(1 <= i, 1, "index out of range")?;
    Ok(n - i as i32)
}

// ── Metatables and raw access ─────────────────────────────────────────────────

fn base_getmetatable(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    if !state.get_metatable(1)? {
        state.push_nil();
        return Ok(1);
    }
    state.get_metafield(1, "__metatable")?;
    Ok(1)
}

fn base_setmetatable(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_type(1, LuaType::Table)?;
    let mt_type = state.type_of(2);
    state.arg_check(
        matches!(mt_type, LuaType::Nil | LuaType::Table),
        2,
        "nil or table expected",
    )?;
    if state.get_metafield(1, "__metatable")? != LuaType::Nil {
        return Err(state.error_message("cannot change a protected metatable"));
    }
    state.set_top(2)?;
    state.set_metatable(1)?;
    Ok(1)
}

fn base_rawequal(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    state.check_any(2)?;
    let eq = state.raw_equal(1, 2);
    state.push_boolean(eq);
    Ok(1)
}

fn base_rawlen(state: &mut LuaState) -> Result<i32, LuaError> {
    let tp = state.type_of(1);
    state.arg_check(
        matches!(tp, LuaType::Table | LuaType::String),
        1,
        "table or string expected",
    )?;
    let n = state.raw_len(1);
    state.push_integer(n as i64);
    Ok(1)
}

fn base_rawget(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_type(1, LuaType::Table)?;
    state.check_any(2)?;
    state.set_top(2)?;
    state.raw_get(1)?;
    Ok(1)
}

fn base_rawset(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_type(1, LuaType::Table)?;
    state.check_any(2)?;
    state.check_any(3)?;
    state.set_top(3)?;
    state.raw_set(1)?;
    Ok(1)
}

// ── Conversions ───────────────────────────────────────────────────────────────

fn base_type(state: &mut LuaState) -> Result<i32, LuaError> {
    let tp = state.type_of(1);
    state.arg_check(tp != LuaType::None, 1, "value expected")?;
    state.push_string(tp.name());
    Ok(1)
}

fn base_tostring(state: &mut LuaState) -> Result<i32, LuaError> {
    state.check_any(1)?;
    let s = state.to_string_meta(1)?;
    state.push_string(s);
    Ok(1)
}

fn base_tonumber(state: &mut LuaState) -> Result<i32, LuaError> {
    if state.is_none_or_nil(2) {
        if state.type_of(1) == LuaType::Number {
            state.set_top(1)?;
            return Ok(1);
        }
        state.check_any(1)?;
        let converted = match state.to_value(1) {
            LuaValue::LuaString(s) => LuaValue::LuaString(s).to_number().map(LuaValue::from),
            _ => None,
        };
        state.push(converted.unwrap_or(LuaValue::Nil));
        return Ok(1);
    }
    let base = state.check_integer(2)?;
    state.check_type(1, LuaType::String)?;
    state.arg_check((2..=36).contains(&base), 2, "base out of range")?;
    let digits = state.to_string(1);
    match parse_in_base(digits.trim(), base as u32) {
        Some(n) => state.push_integer(n),
        None => state.push_nil(),
    }
    Ok(1)
}

/// Integer in `base`, with an optional leading minus. Overflow wraps.
fn parse_in_base(s: &str, base: u32) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for ch in digits.chars() {
        let d = ch.to_digit(base)?;
        n = n.wrapping_mul(i64::from(base)).wrapping_add(i64::from(d));
    }
    Some(if negative { n.wrapping_neg() } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> LuaState {
        let mut state = LuaState::new();
        state.open_libs().unwrap();
        state
    }

    /// Call global `name` with `args`, returning every result.
    fn call_global(state: &mut LuaState, name: &str, args: Vec<LuaValue>) -> Vec<LuaValue> {
        state.get_global(name).unwrap();
        let f = state.pop_value().unwrap();
        state.call_value(f, args, LUA_MULTRET).unwrap()
    }

    fn s(v: &str) -> LuaValue {
        LuaValue::string(v)
    }

    fn raise_table(state: &mut LuaState) -> Result<i32, LuaError> {
        state.new_table();
        Err(state.error())
    }

    // ── Globals ──────────────────────────────────────────────────────────────

    #[test]
    fn open_base_installs_g_and_version() {
        let mut state = opened();
        state.get_global("_VERSION").unwrap();
        assert_eq!(state.to_string(-1), "Lua 5.3");
        state.get_global("_G").unwrap();
        state.push_global_table();
        assert!(state.raw_equal(-1, -2));
    }

    // ── select / type / tonumber ─────────────────────────────────────────────

    #[test]
    fn select_counts_and_slices() {
        let mut state = opened();
        let args = vec![s("#"), s("a"), s("b"), s("c")];
        assert_eq!(call_global(&mut state, "select", args), vec![LuaValue::Integer(3)]);
        let args = vec![LuaValue::Integer(2), s("a"), s("b"), s("c")];
        assert_eq!(call_global(&mut state, "select", args), vec![s("b"), s("c")]);
        let args = vec![LuaValue::Integer(-1), s("a"), s("b")];
        assert_eq!(call_global(&mut state, "select", args), vec![s("b")]);
    }

    #[test]
    fn type_names_values() {
        let mut state = opened();
        assert_eq!(call_global(&mut state, "type", vec![LuaValue::Nil]), vec![s("nil")]);
        assert_eq!(call_global(&mut state, "type", vec![LuaValue::Float(1.0)]), vec![s("number")]);
    }

    #[test]
    fn tonumber_conversions() {
        let mut state = opened();
        assert_eq!(call_global(&mut state, "tonumber", vec![s(" 10 ")]), vec![LuaValue::Integer(10)]);
        assert_eq!(call_global(&mut state, "tonumber", vec![s("z")]), vec![LuaValue::Nil]);
        assert_eq!(
            call_global(&mut state, "tonumber", vec![s("ff"), LuaValue::Integer(16)]),
            vec![LuaValue::Integer(255)]
        );
        assert_eq!(
            call_global(&mut state, "tonumber", vec![s("-101"), LuaValue::Integer(2)]),
            vec![LuaValue::Integer(-5)]
        );
        assert_eq!(parse_in_base("", 10), None);
        assert_eq!(parse_in_base("19", 8), None);
    }

    #[test]
    fn tostring_formats_numbers() {
        let mut state = opened();
        assert_eq!(call_global(&mut state, "tostring", vec![LuaValue::Float(3.0)]), vec![s("3.0")]);
        assert_eq!(call_global(&mut state, "tostring", vec![LuaValue::Boolean(false)]), vec![s("false")]);
    }

    // ── Protected calls ──────────────────────────────────────────────────────

    #[test]
    fn pcall_catches_error_objects() {
        let mut state = opened();
        state.get_global("error").unwrap();
        let error_fn = state.pop_value().unwrap();
        let results = call_global(&mut state, "pcall", vec![error_fn, s("boom")]);
        assert_eq!(results, vec![LuaValue::Boolean(false), s("boom")]);
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn pcall_passes_results_through() {
        let mut state = opened();
        state.get_global("select").unwrap();
        let select = state.pop_value().unwrap();
        let results = call_global(&mut state, "pcall", vec![select, s("#"), s("x")]);
        assert_eq!(results, vec![LuaValue::Boolean(true), LuaValue::Integer(1)]);
    }

    #[test]
    fn xpcall_runs_the_handler() {
        let mut state = opened();
        state.push_host_function(raise_table);
        let raiser = state.pop_value().unwrap();
        state.get_global("type").unwrap();
        let handler = state.pop_value().unwrap();
        let results = call_global(&mut state, "xpcall", vec![raiser, handler]);
        assert_eq!(results, vec![LuaValue::Boolean(false), s("table")]);
    }

    #[test]
    fn assert_passes_values_or_raises() {
        let mut state = opened();
        let results = call_global(&mut state, "assert", vec![LuaValue::Integer(1), s("m")]);
        assert_eq!(results, vec![LuaValue::Integer(1), s("m")]);

        state.get_global("assert").unwrap();
        let assert_fn = state.pop_value().unwrap();
        let err = state.call_value(assert_fn.clone(), vec![LuaValue::Boolean(false)], 0);
        assert_eq!(err, Err(LuaError::Runtime(s("assertion failed!"))));
        let err = state.call_value(assert_fn, vec![LuaValue::Nil, s("custom")], 0);
        assert_eq!(err, Err(LuaError::Runtime(s("custom"))));
    }

    // ── Metatables and iteration ─────────────────────────────────────────────

    #[test]
    fn protected_metatables_cannot_be_replaced() {
        let mut state = opened();
        let t = LuaValue::new_table();
        let mt = LuaValue::new_table();
        if let LuaValue::Table(m) = &mt {
            m.write().put_str("__metatable", s("locked"));
        }
        call_global(&mut state, "setmetatable", vec![t.clone(), mt]);
        assert_eq!(call_global(&mut state, "getmetatable", vec![t.clone()]), vec![s("locked")]);

        state.get_global("setmetatable").unwrap();
        let setmt = state.pop_value().unwrap();
        let err = state.call_value(setmt, vec![t, LuaValue::new_table()], 0);
        assert_eq!(err, Err(LuaError::Runtime(s("cannot change a protected metatable"))));
    }

    #[test]
    fn ipairs_stops_at_first_nil() {
        let mut state = opened();
        let t = LuaValue::new_table();
        if let LuaValue::Table(tbl) = &t {
            let mut tbl = tbl.write();
            tbl.put_int(1, s("a"));
            tbl.put_int(2, s("b"));
            tbl.put_int(4, s("d"));
        }
        let mut triple = call_global(&mut state, "ipairs", vec![t]);
        assert_eq!(triple.len(), 3);
        let control = triple.pop().unwrap();
        let table = triple.pop().unwrap();
        let iter = triple.pop().unwrap();

        let mut seen = Vec::new();
        let mut key = control;
        loop {
            let mut r = state
                .call_value(iter.clone(), vec![table.clone(), key.clone()], 2)
                .unwrap();
            let v = r.pop().unwrap();
            let k = r.pop().unwrap();
            if k.is_nil() || v.is_nil() {
                break;
            }
            seen.push(v);
            key = k;
        }
        assert_eq!(seen, vec![s("a"), s("b")]);
    }

    #[test]
    fn rawlen_rejects_numbers() {
        let mut state = opened();
        assert_eq!(call_global(&mut state, "rawlen", vec![s("abc")]), vec![LuaValue::Integer(3)]);
        state.get_global("rawlen").unwrap();
        let rawlen = state.pop_value().unwrap();
        assert!(matches!(
            state.call_value(rawlen, vec![LuaValue::Integer(1)], 1),
            Err(LuaError::BadArgument { arg: 1, .. })
        ));
    }
}
