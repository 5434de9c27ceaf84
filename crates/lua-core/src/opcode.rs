/// Bytecode instruction set for the lua-rust virtual machine.
///
/// This is the register-based Lua 5.3 ISA. The discriminant of each variant is
/// the 6-bit opcode stored in the low bits of an [`Instruction`](crate::Instruction)
/// word, so the numbering here must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,
    LoadK,
    LoadKx,
    LoadBool,
    LoadNil,
    GetUpval,
    GetTabUp,
    GetTable,
    SetTabUp,
    SetUpval,
    SetTable,
    NewTable,
    SelfOp,
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
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForCall,
    TForLoop,
    SetList,
    Closure,
    VarArg,
    ExtraArg,
}

/// Operand layout of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    /// `B:9 C:9 A:8 Op:6`
    IABC,
    /// `Bx:18 A:8 Op:6`
    IABx,
    /// `sBx:18 A:8 Op:6`, with `sBx` stored excess-K
    IAsBx,
    /// `Ax:26 Op:6`
    IAx,
}

/// How an instruction interprets its B / C operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArgMask {
    /// Argument is not used.
    N,
    /// Argument is used as a plain number.
    U,
    /// Argument is a register or a jump offset.
    R,
    /// Argument is a constant or register/constant (RK).
    K,
}

// ── Static operand table ─────────────────────────────────────────────────────

/// Per-opcode metadata used by the disassembler and the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    /// The instruction is a test; the next instruction must be a jump.
    pub test_flag: bool,
    /// The instruction writes register A.
    pub set_a_flag: bool,
    pub arg_b: OpArgMask,
    pub arg_c: OpArgMask,
    pub mode: OpMode,
    pub name: &'static str,
}

const fn info(
    test_flag: bool,
    set_a_flag: bool,
    arg_b: OpArgMask,
    arg_c: OpArgMask,
    mode: OpMode,
    name: &'static str,
) -> OpInfo {
    OpInfo {
        test_flag,
        set_a_flag,
        arg_b,
        arg_c,
        mode,
        name,
    }
}

use OpArgMask::{K, N, R, U};
use OpMode::{IABx, IAsBx, IAx, IABC};

static OP_INFO: [OpInfo; 47] = [
    info(false, true, R, N, IABC, "MOVE"),
    info(false, true, K, N, IABx, "LOADK"),
    info(false, true, N, N, IABx, "LOADKX"),
    info(false, true, U, U, IABC, "LOADBOOL"),
    info(false, true, U, N, IABC, "LOADNIL"),
    info(false, true, U, N, IABC, "GETUPVAL"),
    info(false, true, U, K, IABC, "GETTABUP"),
    info(false, true, R, K, IABC, "GETTABLE"),
    info(false, false, K, K, IABC, "SETTABUP"),
    info(false, false, U, N, IABC, "SETUPVAL"),
    info(false, false, K, K, IABC, "SETTABLE"),
    info(false, true, U, U, IABC, "NEWTABLE"),
    info(false, true, R, K, IABC, "SELF"),
    info(false, true, K, K, IABC, "ADD"),
    info(false, true, K, K, IABC, "SUB"),
    info(false, true, K, K, IABC, "MUL"),
    info(false, true, K, K, IABC, "MOD"),
    info(false, true, K, K, IABC, "POW"),
    info(false, true, K, K, IABC, "DIV"),
    info(false, true, K, K, IABC, "IDIV"),
    info(false, true, K, K, IABC, "BAND"),
    info(false, true, K, K, IABC, "BOR"),
    info(false, true, K, K, IABC, "BXOR"),
    info(false, true, K, K, IABC, "SHL"),
    info(false, true, K, K, IABC, "SHR"),
    info(false, true, R, N, IABC, "UNM"),
    info(false, true, R, N, IABC, "BNOT"),
    info(false, true, R, N, IABC, "NOT"),
    info(false, true, R, N, IABC, "LEN"),
    info(false, true, R, R, IABC, "CONCAT"),
    info(false, false, R, N, IAsBx, "JMP"),
    info(true, false, K, K, IABC, "EQ"),
    info(true, false, K, K, IABC, "LT"),
    info(true, false, K, K, IABC, "LE"),
    info(true, false, N, U, IABC, "TEST"),
    info(true, true, R, U, IABC, "TESTSET"),
    info(false, true, U, U, IABC, "CALL"),
    info(false, true, U, U, IABC, "TAILCALL"),
    info(false, false, U, N, IABC, "RETURN"),
    info(false, true, R, N, IAsBx, "FORLOOP"),
    info(false, true, R, N, IAsBx, "FORPREP"),
    info(false, false, N, U, IABC, "TFORCALL"),
    info(false, true, R, N, IAsBx, "TFORLOOP"),
    info(false, false, U, U, IABC, "SETLIST"),
    info(false, true, U, N, IABx, "CLOSURE"),
    info(false, true, U, N, IABC, "VARARG"),
    info(false, false, U, U, IAx, "EXTRAARG"),
];

const ALL: [OpCode; 47] = [
    OpCode::Move,
    OpCode::LoadK,
    OpCode::LoadKx,
    OpCode::LoadBool,
    OpCode::LoadNil,
    OpCode::GetUpval,
    OpCode::GetTabUp,
    OpCode::GetTable,
    OpCode::SetTabUp,
    OpCode::SetUpval,
    OpCode::SetTable,
    OpCode::NewTable,
    OpCode::SelfOp,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Mod,
    OpCode::Pow,
    OpCode::Div,
    OpCode::IDiv,
    OpCode::BAnd,
    OpCode::BOr,
    OpCode::BXor,
    OpCode::Shl,
    OpCode::Shr,
    OpCode::Unm,
    OpCode::BNot,
    OpCode::Not,
    OpCode::Len,
    OpCode::Concat,
    OpCode::Jmp,
    OpCode::Eq,
    OpCode::Lt,
    OpCode::Le,
    OpCode::Test,
    OpCode::TestSet,
    OpCode::Call,
    OpCode::TailCall,
    OpCode::Return,
    OpCode::ForLoop,
    OpCode::ForPrep,
    OpCode::TForCall,
    OpCode::TForLoop,
    OpCode::SetList,
    OpCode::Closure,
    OpCode::VarArg,
    OpCode::ExtraArg,
];

impl OpCode {
    /// Decode a raw 6-bit opcode. Returns `None` for the unassigned values 47..=63.
    pub fn from_u8(raw: u8) -> Option<OpCode> {
        ALL.get(raw as usize).copied()
    }

    pub fn info(self) -> &'static OpInfo {
        &OP_INFO[self as usize]
    }

    /// Mnemonic as printed by `luac -l`.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn mode(self) -> OpMode {
        self.info().mode
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
