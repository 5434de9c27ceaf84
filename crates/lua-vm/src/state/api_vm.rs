//! The part of the stack API only the dispatcher needs: program counter,
//! constants, register window, varargs and closure creation.

use std::sync::Arc;

use lua_core::instruction::{index_k, is_k};
use lua_core::{Instruction, Prototype};

use crate::closure::LuaClosure;
use crate::error::LuaError;
use crate::state::LuaState;
use crate::value::LuaValue;

impl LuaState {
    fn running_proto(&self) -> Result<&Arc<Prototype>, LuaError> {
        self.current
            .proto
            .as_ref()
            .ok_or_else(|| LuaError::Internal("no Lua function is running".into()))
    }

    pub fn pc(&self) -> usize {
        self.current.pc
    }

    pub fn add_pc(&mut self, n: i32) {
        self.current.pc = self.current.pc.wrapping_add_signed(n as isize);
    }

    /// The instruction at `pc`, advancing `pc` past it.
    pub fn fetch(&mut self) -> Result<Instruction, LuaError> {
        let pc = self.current.pc;
        let inst = self
            .running_proto()?
            .codes
            .get(pc)
            .copied()
            .ok_or_else(|| LuaError::Internal(format!("pc {pc} ran off the end of the code")))?;
        self.current.pc = pc + 1;
        Ok(inst)
    }

    /// Push constant `idx` of the running function.
    pub fn get_const(&mut self, idx: i32) -> Result<(), LuaError> {
        let val = self
            .running_proto()?
            .constants
            .get(idx as usize)
            .map(LuaValue::from)
            .ok_or_else(|| LuaError::Internal(format!("constant {idx} out of range")))?;
        self.push(val);
        Ok(())
    }

    /// Push the RK operand `rk`: a constant when its top bit is set,
    /// otherwise register `rk`.
    pub fn get_rk(&mut self, rk: i32) -> Result<(), LuaError> {
        if is_k(rk) {
            self.get_const(index_k(rk))
        } else {
            self.push_value(rk + 1)
        }
    }

    /// Size of the running function's register window.
    pub fn register_count(&self) -> i32 {
        self.current
            .proto
            .as_ref()
            .map_or(0, |p| i32::from(p.max_register_size))
    }

    /// Push `n` varargs (nil-padded), or all of them when `n` is negative.
    pub fn load_varargs(&mut self, n: i32) {
        let mut vals = self.current.varargs.clone();
        if n >= 0 {
            vals.resize(n as usize, LuaValue::Nil);
        }
        self.push_values(vals);
    }

    /// Instantiate nested prototype `idx` as a closure and push it. Upvalues
    /// in the enclosing frame are captured as open cells, shared with any
    /// other closure over the same local; the rest are inherited from the
    /// running closure.
    pub fn load_proto(&mut self, idx: i32) -> Result<(), LuaError> {
        let sub = self
            .running_proto()?
            .protos
            .get(idx as usize)
            .cloned()
            .ok_or_else(|| LuaError::Internal(format!("prototype {idx} out of range")))?;
        let parent = self.current.closure.clone();
        let mut upvalues = Vec::with_capacity(sub.upvalues.len());
        for desc in &sub.upvalues {
            let cell = if desc.in_stack {
                self.current.capture(desc.index as usize)
            } else {
                parent
                    .as_ref()
                    .and_then(|c| c.upvalues.get(desc.index as usize))
                    .cloned()
                    .ok_or_else(|| {
                        LuaError::Internal(format!("enclosing upvalue {} missing", desc.index))
                    })?
            };
            upvalues.push(cell);
        }
        self.push(LuaValue::Function(Arc::new(LuaClosure::lua(sub, upvalues))));
        Ok(())
    }

    /// Close the open upvalues of stack slots at 1-based index `level` and
    /// above.
    pub fn close_upvalues(&mut self, level: i32) {
        self.current.close_upvalues((level - 1).max(0) as usize);
    }
}
