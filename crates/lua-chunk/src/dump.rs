//! Binary encoder: [`Prototype`] → Lua 5.3 binary chunk.
//!
//! Produces the same byte layout `luac` writes on a little-endian 64-bit host,
//! so its output loads in the reference interpreter and in [`crate::undump`].

use lua_core::{Constant, Prototype};

use crate::undump::{
    CINT_SIZE, CSIZET_SIZE, INSTRUCTION_SIZE, LUAC_DATA, LUAC_FORMAT, LUAC_INT, LUAC_NUM,
    LUAC_VERSION, LUA_INTEGER_SIZE, LUA_NUMBER_SIZE, LUA_SIGNATURE, TAG_BOOLEAN, TAG_INTEGER,
    TAG_LONG_STR, TAG_NIL, TAG_NUMBER, TAG_SHORT_STR,
};

/// Strings up to this length (plus one) use the one-byte size form.
const SHORT_STR_MAX: usize = 40;

// ── Low-level write helpers ────────────────────────────────────────────────

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_count(buf: &mut Vec<u8>, n: usize) {
    push_u32(buf, n as u32);
}

fn push_string(buf: &mut Vec<u8>, s: Option<&str>) {
    let Some(s) = s else {
        buf.push(0);
        return;
    };
    let size = s.len() + 1;
    if size < 0xFF {
        buf.push(size as u8);
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&(size as u64).to_le_bytes());
    }
    buf.extend_from_slice(s.as_bytes());
}

// ── Chunk encoder ──────────────────────────────────────────────────────────

/// Encode `proto` as a main-chunk binary.
pub fn dump(proto: &Prototype) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + proto.codes.len() * 4);
    buf.extend_from_slice(LUA_SIGNATURE);
    buf.push(LUAC_VERSION);
    buf.push(LUAC_FORMAT);
    buf.extend_from_slice(LUAC_DATA);
    buf.extend_from_slice(&[
        CINT_SIZE,
        CSIZET_SIZE,
        INSTRUCTION_SIZE,
        LUA_INTEGER_SIZE,
        LUA_NUMBER_SIZE,
    ]);
    buf.extend_from_slice(&LUAC_INT.to_le_bytes());
    buf.extend_from_slice(&LUAC_NUM.to_le_bytes());
    buf.push(proto.upvalues.len() as u8);
    dump_proto(proto, None, &mut buf);
    buf
}

fn dump_proto(proto: &Prototype, parent_source: Option<&str>, buf: &mut Vec<u8>) {
    if parent_source == Some(proto.source.as_str()) {
        push_string(buf, None);
    } else {
        push_string(buf, Some(&proto.source));
    }
    push_u32(buf, proto.line_defined);
    push_u32(buf, proto.last_line_defined);
    buf.push(proto.num_params);
    buf.push(proto.is_vararg as u8);
    buf.push(proto.max_register_size);

    push_count(buf, proto.codes.len());
    for code in &proto.codes {
        push_u32(buf, code.0);
    }

    push_count(buf, proto.constants.len());
    for k in &proto.constants {
        dump_constant(k, buf);
    }

    push_count(buf, proto.upvalues.len());
    for uv in &proto.upvalues {
        buf.push(uv.in_stack as u8);
        buf.push(uv.index);
    }

    push_count(buf, proto.protos.len());
    for sub in &proto.protos {
        dump_proto(sub, Some(&proto.source), buf);
    }

    push_count(buf, proto.line_info.len());
    for line in &proto.line_info {
        push_u32(buf, *line);
    }

    push_count(buf, proto.loc_vars.len());
    for var in &proto.loc_vars {
        push_string(buf, Some(&var.name));
        push_u32(buf, var.start_pc);
        push_u32(buf, var.end_pc);
    }

    push_count(buf, proto.upvalue_names.len());
    for name in &proto.upvalue_names {
        push_string(buf, Some(name));
    }
}

fn dump_constant(k: &Constant, buf: &mut Vec<u8>) {
    match k {
        Constant::Nil => buf.push(TAG_NIL),
        Constant::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            buf.push(*b as u8);
        }
        Constant::Integer(i) => {
            buf.push(TAG_INTEGER);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Constant::Float(f) => {
            buf.push(TAG_NUMBER);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Constant::String(s) => {
            buf.push(if s.len() <= SHORT_STR_MAX { TAG_SHORT_STR } else { TAG_LONG_STR });
            push_string(buf, Some(s));
        }
    }
}
