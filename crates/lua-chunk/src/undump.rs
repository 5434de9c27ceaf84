//! Binary decoder: Lua 5.3 `luac` output → [`Prototype`].
//!
//! Layout: header (signature, version, format, LUAC_DATA, type sizes, check
//! integer and float), one byte with the main function's upvalue count, then
//! the main prototype encoded recursively.

use std::sync::Arc;

use lua_core::{Constant, Instruction, LocVar, Prototype, UpvalueDesc};
use tracing::debug;

use crate::error::ChunkError;

pub const LUA_SIGNATURE: &[u8] = b"\x1bLua";
pub const LUAC_VERSION: u8 = 0x53;
pub const LUAC_FORMAT: u8 = 0;
pub const LUAC_DATA: &[u8] = b"\x19\x93\r\n\x1a\n";
pub const CINT_SIZE: u8 = 4;
pub const CSIZET_SIZE: u8 = 8;
pub const INSTRUCTION_SIZE: u8 = 4;
pub const LUA_INTEGER_SIZE: u8 = 8;
pub const LUA_NUMBER_SIZE: u8 = 8;
pub const LUAC_INT: i64 = 0x5678;
pub const LUAC_NUM: f64 = 370.5;

pub const TAG_NIL: u8 = 0x00;
pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_NUMBER: u8 = 0x03;
pub const TAG_INTEGER: u8 = 0x13;
pub const TAG_SHORT_STR: u8 = 0x04;
pub const TAG_LONG_STR: u8 = 0x14;

/// Whether `bytes` starts with the binary chunk signature.
pub fn is_binary_chunk(bytes: &[u8]) -> bool {
    bytes.starts_with(LUA_SIGNATURE)
}

/// Decode a complete binary chunk into its main prototype.
pub fn undump(bytes: &[u8]) -> Result<Arc<Prototype>, ChunkError> {
    let mut r = Reader::new(bytes);
    r.check_header()?;
    let _size_upvalues = r.read_u8()?;
    let proto = r.read_proto("")?;
    debug!(
        target: "lua::chunk",
        source = %proto.source,
        instructions = proto.codes.len(),
        protos = proto.protos.len(),
        "undumped chunk"
    );
    Ok(Arc::new(proto))
}

// ── Cursor reader ─────────────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ChunkError> {
        if self.data.len() - self.pos < n {
            return Err(ChunkError::Truncated {
                need: n,
                offset: self.pos,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ChunkError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, ChunkError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ChunkError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ChunkError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_lua_integer(&mut self) -> Result<i64, ChunkError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_lua_number(&mut self) -> Result<f64, ChunkError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Strings carry `len + 1` in one byte, or `0xFF` followed by a `size_t`.
    /// Zero means "no string".
    fn read_string(&mut self) -> Result<String, ChunkError> {
        let mut size = self.read_u8()? as u64;
        if size == 0 {
            return Ok(String::new());
        }
        if size == 0xFF {
            size = self.read_u64()?;
        }
        let start = self.pos;
        let bytes = self.read_bytes((size - 1) as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ChunkError::Utf8(start))
    }

    fn read_count(&mut self) -> Result<usize, ChunkError> {
        Ok(self.read_u32()? as usize)
    }

    // ── Header ────────────────────────────────────────────────────────────────

    fn check_header(&mut self) -> Result<(), ChunkError> {
        if self.read_bytes(4).ok() != Some(LUA_SIGNATURE) {
            return Err(ChunkError::Signature);
        }
        let version = self.read_u8()?;
        if version != LUAC_VERSION {
            return Err(ChunkError::Version(version));
        }
        let format = self.read_u8()?;
        if format != LUAC_FORMAT {
            return Err(ChunkError::Format(format));
        }
        if self.read_bytes(6)? != LUAC_DATA {
            return Err(ChunkError::Header("corrupted LUAC_DATA"));
        }
        let sizes = [
            (CINT_SIZE, "int size mismatch"),
            (CSIZET_SIZE, "size_t size mismatch"),
            (INSTRUCTION_SIZE, "instruction size mismatch"),
            (LUA_INTEGER_SIZE, "lua_Integer size mismatch"),
            (LUA_NUMBER_SIZE, "lua_Number size mismatch"),
        ];
        for (expected, message) in sizes {
            if self.read_u8()? != expected {
                return Err(ChunkError::Header(message));
            }
        }
        if self.read_lua_integer()? != LUAC_INT {
            return Err(ChunkError::Header("endianness mismatch"));
        }
        if self.read_lua_number()? != LUAC_NUM {
            return Err(ChunkError::Header("float format mismatch"));
        }
        Ok(())
    }

    // ── Prototype ─────────────────────────────────────────────────────────────

    fn read_proto(&mut self, parent_source: &str) -> Result<Prototype, ChunkError> {
        let mut source = self.read_string()?;
        // Nested functions omit the source and inherit their parent's.
        if source.is_empty() {
            source = parent_source.to_string();
        }
        let line_defined = self.read_u32()?;
        let last_line_defined = self.read_u32()?;
        let num_params = self.read_u8()?;
        let is_vararg = self.read_u8()? != 0;
        let max_register_size = self.read_u8()?;

        let n = self.read_count()?;
        let mut codes = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            codes.push(Instruction(self.read_u32()?));
        }

        let n = self.read_count()?;
        let mut constants = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            constants.push(self.read_constant()?);
        }

        let n = self.read_count()?;
        let mut upvalues = Vec::with_capacity(n.min(256));
        for _ in 0..n {
            let in_stack = self.read_u8()? != 0;
            let index = self.read_u8()?;
            upvalues.push(UpvalueDesc { in_stack, index });
        }

        let n = self.read_count()?;
        let mut protos = Vec::with_capacity(n.min(1 << 10));
        for _ in 0..n {
            protos.push(Arc::new(self.read_proto(&source)?));
        }

        let n = self.read_count()?;
        let mut line_info = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            line_info.push(self.read_u32()?);
        }

        let n = self.read_count()?;
        let mut loc_vars = Vec::with_capacity(n.min(1 << 10));
        for _ in 0..n {
            loc_vars.push(LocVar {
                name: self.read_string()?,
                start_pc: self.read_u32()?,
                end_pc: self.read_u32()?,
            });
        }

        let n = self.read_count()?;
        let mut upvalue_names = Vec::with_capacity(n.min(256));
        for _ in 0..n {
            upvalue_names.push(self.read_string()?);
        }

        Ok(Prototype {
            source,
            line_defined,
            last_line_defined,
            num_params,
            is_vararg,
            max_register_size,
            codes,
            constants,
            upvalues,
            protos,
            line_info,
            loc_vars,
            upvalue_names,
        })
    }

    fn read_constant(&mut self) -> Result<Constant, ChunkError> {
        let tag = self.read_u8()?;
        Ok(match tag {
            TAG_NIL => Constant::Nil,
            TAG_BOOLEAN => Constant::Boolean(self.read_u8()? != 0),
            TAG_INTEGER => Constant::Integer(self.read_lua_integer()?),
            TAG_NUMBER => Constant::Float(self.read_lua_number()?),
            TAG_SHORT_STR | TAG_LONG_STR => Constant::String(self.read_string()?),
            other => return Err(ChunkError::ConstantTag(other)),
        })
    }
}
