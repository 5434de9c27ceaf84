//! The instruction dispatcher.
//!
//! Each instruction is a plain function over the decoded instruction and the
//! running state; all register traffic goes through the stack API, with
//! register `R(n)` living at stack index `n + 1`.

mod inst_call;
mod inst_for;
mod inst_misc;
mod inst_operators;
mod inst_table;
mod inst_upvalue;

use lua_core::{Instruction, OpCode};
use tracing::trace;

use crate::arith::{ArithOp, CompareOp};
use crate::error::LuaError;
use crate::state::LuaState;

/// Run the current frame's function until its `RETURN` has staged the
/// results above the register window.
pub(crate) fn execute(vm: &mut LuaState) -> Result<(), LuaError> {
    loop {
        let pc = vm.pc();
        let inst = vm.fetch()?;
        let op = inst
            .opcode()
            .ok_or_else(|| LuaError::Internal(format!("invalid opcode {}", inst.raw_opcode())))?;
        trace!(target: "lua::vm::exec", pc, "{inst}");
        if op == OpCode::Return {
            return inst_call::return_(inst, vm);
        }
        dispatch(op, inst, vm)?;
    }
}

fn dispatch(op: OpCode, i: Instruction, vm: &mut LuaState) -> Result<(), LuaError> {
    match op {
        OpCode::Move => inst_misc::move_(i, vm),
        OpCode::LoadK => inst_misc::load_k(i, vm),
        OpCode::LoadKx => inst_misc::load_kx(i, vm),
        OpCode::LoadBool => inst_misc::load_bool(i, vm),
        OpCode::LoadNil => inst_misc::load_nil(i, vm),
        OpCode::GetUpval => inst_upvalue::get_upval(i, vm),
        OpCode::GetTabUp => inst_upvalue::get_tabup(i, vm),
        OpCode::GetTable => inst_table::get_table(i, vm),
        OpCode::SetTabUp => inst_upvalue::set_tabup(i, vm),
        OpCode::SetUpval => inst_upvalue::set_upval(i, vm),
        OpCode::SetTable => inst_table::set_table(i, vm),
        OpCode::NewTable => inst_table::new_table(i, vm),
        OpCode::SelfOp => inst_table::self_(i, vm),
        OpCode::Add
        | OpCode::Sub
        | OpCode::Mul
        | OpCode::Mod
        | OpCode::Pow
        | OpCode::Div
        | OpCode::IDiv
        | OpCode::BAnd
        | OpCode::BOr
        | OpCode::BXor
        | OpCode::Shl
        | OpCode::Shr => inst_operators::binary_arith(i, vm, arith_op(op)?),
        OpCode::Unm | OpCode::BNot => inst_operators::unary_arith(i, vm, arith_op(op)?),
        OpCode::Not => inst_operators::not(i, vm),
        OpCode::Len => inst_operators::length(i, vm),
        OpCode::Concat => inst_operators::concat(i, vm),
        OpCode::Jmp => inst_misc::jmp(i, vm),
        OpCode::Eq => inst_operators::compare(i, vm, CompareOp::Eq),
        OpCode::Lt => inst_operators::compare(i, vm, CompareOp::Lt),
        OpCode::Le => inst_operators::compare(i, vm, CompareOp::Le),
        OpCode::Test => inst_operators::test(i, vm),
        OpCode::TestSet => inst_operators::test_set(i, vm),
        OpCode::Call => inst_call::call(i, vm),
        OpCode::TailCall => inst_call::tail_call(i, vm),
        OpCode::Return => inst_call::return_(i, vm),
        OpCode::ForLoop => inst_for::for_loop(i, vm),
        OpCode::ForPrep => inst_for::for_prep(i, vm),
        OpCode::TForCall => inst_for::tfor_call(i, vm),
        OpCode::TForLoop => inst_for::tfor_loop(i, vm),
        OpCode::SetList => inst_table::set_list(i, vm),
        OpCode::Closure => inst_call::closure(i, vm),
        OpCode::VarArg => inst_call::vararg(i, vm),
        OpCode::ExtraArg => Ok(()),
    }
}

fn arith_op(op: OpCode) -> Result<ArithOp, LuaError> {
    ArithOp::from_opcode(op)
        .ok_or_else(|| LuaError::Internal(format!("{op} is not an arithmetic opcode")))
}
