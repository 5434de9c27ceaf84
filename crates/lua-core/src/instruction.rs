//! 32-bit instruction words.
//!
//! ```text
//!  31       22       13       5    0
//!   +-------+^------+-^-----+-^-----
//!   |b=9bits |c=9bits |a=8bits|op=6|
//!   +-------+^------+-^-----+-^-----
//!   |    bx=18bits    |a=8bits|op=6|
//!   +-------+^------+-^-----+-^-----
//!   |   sbx=18bits    |a=8bits|op=6|
//!   +-------+^------+-^-----+-^-----
//!   |    ax=26bits            |op=6|
//!   +-------+^------+-^-----+-^-----
//! ```

use crate::opcode::{OpArgMask, OpCode, OpMode};

pub const SIZE_OP: u32 = 6;
pub const SIZE_A: u32 = 8;
pub const SIZE_B: u32 = 9;
pub const SIZE_C: u32 = 9;
pub const SIZE_BX: u32 = SIZE_B + SIZE_C;

pub const MAXARG_A: i32 = (1 << SIZE_A) - 1;
pub const MAXARG_B: i32 = (1 << SIZE_B) - 1;
pub const MAXARG_C: i32 = (1 << SIZE_C) - 1;
pub const MAXARG_BX: i32 = (1 << SIZE_BX) - 1;
pub const MAXARG_SBX: i32 = MAXARG_BX >> 1;
pub const MAXARG_AX: i32 = (1 << 26) - 1;

/// Bit that marks an RK operand as a constant index.
pub const BITRK: i32 = 1 << (SIZE_B - 1);

/// Number of list items accumulated before a `SETLIST` flush.
pub const LFIELDS_PER_FLUSH: i32 = 50;

/// Whether an RK operand addresses the constant pool.
pub fn is_k(rk: i32) -> bool {
    rk & BITRK != 0
}

/// Constant index stored in an RK operand.
pub fn index_k(rk: i32) -> i32 {
    rk & !BITRK
}

/// Encode constant index `k` as an RK operand.
pub fn rk_const(k: i32) -> i32 {
    k | BITRK
}

/// One encoded instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction(pub u32);

impl Instruction {
    // ── Encoding ──────────────────────────────────────────────────────────────

    pub fn abc(op: OpCode, a: i32, b: i32, c: i32) -> Self {
        Self(
            (op as u32)
                | ((a as u32) & 0xFF) << 6
                | ((c as u32) & 0x1FF) << 14
                | ((b as u32) & 0x1FF) << 23,
        )
    }

    pub fn abx(op: OpCode, a: i32, bx: i32) -> Self {
        Self((op as u32) | ((a as u32) & 0xFF) << 6 | ((bx as u32) & 0x3FFFF) << 14)
    }

    pub fn asbx(op: OpCode, a: i32, sbx: i32) -> Self {
        Self::abx(op, a, sbx + MAXARG_SBX)
    }

    pub fn ax(op: OpCode, ax: i32) -> Self {
        Self((op as u32) | ((ax as u32) & 0x3FF_FFFF) << 6)
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    pub fn raw_opcode(self) -> u8 {
        (self.0 & 0x3F) as u8
    }

    pub fn opcode(self) -> Option<OpCode> {
        OpCode::from_u8(self.raw_opcode())
    }

    pub fn abc_args(self) -> (i32, i32, i32) {
        let a = (self.0 >> 6 & 0xFF) as i32;
        let c = (self.0 >> 14 & 0x1FF) as i32;
        let b = (self.0 >> 23 & 0x1FF) as i32;
        (a, b, c)
    }

    pub fn abx_args(self) -> (i32, i32) {
        let a = (self.0 >> 6 & 0xFF) as i32;
        let bx = (self.0 >> 14) as i32;
        (a, bx)
    }

    pub fn asbx_args(self) -> (i32, i32) {
        let (a, bx) = self.abx_args();
        (a, bx - MAXARG_SBX)
    }

    pub fn ax_arg(self) -> i32 {
        (self.0 >> 6) as i32
    }
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instruction({:#010x} {self})", self.0)
    }
}

/// Prints the mnemonic and operands the way `luac -l` lays them out:
/// constants appear as negative numbers `-1 - k`.
impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(op) = self.opcode() else {
            return write!(f, "<bad opcode {}>", self.raw_opcode());
        };
        let info = op.info();
        write!(f, "{:<9}", op.name())?;
        match info.mode {
            OpMode::IABC => {
                let (a, b, c) = self.abc_args();
                write!(f, " {a}")?;
                if info.arg_b != OpArgMask::N {
                    write!(f, " {}", rk_display(b, info.arg_b))?;
                }
                if info.arg_c != OpArgMask::N {
                    write!(f, " {}", rk_display(c, info.arg_c))?;
                }
                Ok(())
            }
            OpMode::IABx => {
                let (a, bx) = self.abx_args();
                match info.arg_b {
                    OpArgMask::K => write!(f, " {a} {}", -1 - bx),
                    OpArgMask::U => write!(f, " {a} {bx}"),
                    _ => write!(f, " {a}"),
                }
            }
            OpMode::IAsBx => {
                let (a, sbx) = self.asbx_args();
                write!(f, " {a} {sbx}")
            }
            OpMode::IAx => write!(f, " {}", -1 - self.ax_arg()),
        }
    }
}

fn rk_display(arg: i32, mask: OpArgMask) -> i32 {
    if mask == OpArgMask::K && is_k(arg) {
        -1 - index_k(arg)
    } else {
        arg
    }
}
