//! `lua-core` — bytecode-level types shared across the lua-rust workspace.
//!
//! This crate defines:
//! - [`OpCode`] and the static operand table of the Lua 5.3 instruction set
//! - [`Instruction`]: a 32-bit instruction word with its field decoders
//! - [`Prototype`]: the immutable compiled-function artifact
//! - [`number`]: the integer/float conversion and operator rules

pub mod instruction;
pub mod number;
pub mod opcode;
pub mod proto;

pub use instruction::Instruction;
pub use number::Number;
pub use opcode::{OpArgMask, OpCode, OpMode};
pub use proto::{Constant, LocVar, Prototype, UpvalueDesc};
