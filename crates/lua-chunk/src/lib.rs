//! `lua-chunk` — producers of [`Prototype`](lua_core::Prototype) artifacts.
//!
//! - [`undump`] / [`dump`]: the Lua 5.3 binary chunk format
//! - [`ProtoBuilder`]: hand-assembly of prototypes
//! - [`disassemble`]: `luac -l` style listings

pub mod builder;
pub mod disasm;
pub mod dump;
pub mod error;
pub mod undump;

pub use builder::ProtoBuilder;
pub use disasm::disassemble;
pub use dump::dump;
pub use error::ChunkError;
pub use undump::{is_binary_chunk, undump};
