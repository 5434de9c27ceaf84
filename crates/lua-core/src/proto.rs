//! Function prototypes: the immutable artifact a compiler or chunk loader
//! hands to the VM.

use std::sync::Arc;

use crate::instruction::Instruction;

// ── Constants ─────────────────────────────────────────────────────────────────

/// An entry of a prototype's constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Constant {
    /// Pool deduplication must not merge `1` with `1.0` or `0.0` with `-0.0`.
    pub fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

// ── Upvalue descriptors ───────────────────────────────────────────────────────

/// Describes where to find an upvalue at closure instantiation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// `true`: capture register `index` of the enclosing frame.
    /// `false`: reuse upvalue `index` of the enclosing closure.
    pub in_stack: bool,
    pub index: u8,
}

impl UpvalueDesc {
    pub fn stack(index: u8) -> Self {
        Self { in_stack: true, index }
    }

    pub fn upvalue(index: u8) -> Self {
        Self { in_stack: false, index }
    }
}

/// Debug record of a local variable's live range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocVar {
    pub name: String,
    pub start_pc: u32,
    pub end_pc: u32,
}

// ── Function prototype ────────────────────────────────────────────────────────

/// A compiled function prototype, immutable once built.
///
/// Every Lua function (top-level chunk or nested function) is one `Prototype`.
/// Closures share a prototype via `Arc`; upvalue cells are per closure.
#[derive(Debug, Clone, Default)]
pub struct Prototype {
    /// Debug: chunk name, e.g. `@main.lua`.
    pub source: String,
    pub line_defined: u32,
    pub last_line_defined: u32,
    /// Number of fixed parameters.
    pub num_params: u8,
    /// Whether the function accepts `...`.
    pub is_vararg: bool,
    /// Size of the register window a call to this function needs.
    pub max_register_size: u8,
    pub codes: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub upvalues: Vec<UpvalueDesc>,
    /// Nested prototypes referenced by `CLOSURE`.
    pub protos: Vec<Arc<Prototype>>,
    /// Source line for each entry of `codes`.
    pub line_info: Vec<u32>,
    pub loc_vars: Vec<LocVar>,
    pub upvalue_names: Vec<String>,
}

impl Prototype {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Source line of instruction `pc`, if line info was kept.
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }
}
