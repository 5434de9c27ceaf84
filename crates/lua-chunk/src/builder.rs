use std::sync::Arc;

use lua_core::{Constant, Instruction, OpCode, Prototype, UpvalueDesc};

// ── Proto builder ─────────────────────────────────────────────────────────────

/// Mutable builder for a [`Prototype`].
///
/// Embedders without a compiler use it to hand-assemble functions; the VM's
/// own tests build every program through it.
#[derive(Debug)]
pub struct ProtoBuilder {
    proto: Prototype,
    line: u32,
}

impl ProtoBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        let mut proto = Prototype::new(source);
        // luac never emits a frame smaller than two registers
        proto.max_register_size = 2;
        Self { proto, line: 0 }
    }

    pub fn params(&mut self, n: u8) -> &mut Self {
        self.proto.num_params = n;
        self
    }

    pub fn vararg(&mut self) -> &mut Self {
        self.proto.is_vararg = true;
        self
    }

    pub fn registers(&mut self, n: u8) -> &mut Self {
        self.proto.max_register_size = n;
        self
    }

    /// Line recorded for subsequently emitted instructions.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Declare the `_ENV` upvalue a main chunk expects in slot 0.
    pub fn env_upvalue(&mut self) -> &mut Self {
        self.upvalue(UpvalueDesc::stack(0), "_ENV");
        self
    }

    pub fn upvalue(&mut self, desc: UpvalueDesc, name: impl Into<String>) -> i32 {
        self.proto.upvalues.push(desc);
        self.proto.upvalue_names.push(name.into());
        self.proto.upvalues.len() as i32 - 1
    }

    pub fn constant(&mut self, value: Constant) -> i32 {
        // deduplicate, but keep 1 / 1.0 and 0.0 / -0.0 apart
        if let Some(idx) = self.proto.constants.iter().position(|c| c.same_as(&value)) {
            return idx as i32;
        }
        self.proto.constants.push(value);
        self.proto.constants.len() as i32 - 1
    }

    pub fn string(&mut self, s: &str) -> i32 {
        self.constant(Constant::String(s.to_string()))
    }

    pub fn integer(&mut self, n: i64) -> i32 {
        self.constant(Constant::Integer(n))
    }

    pub fn proto(&mut self, proto: Prototype) -> i32 {
        self.proto.protos.push(Arc::new(proto));
        self.proto.protos.len() as i32 - 1
    }

    // ── Code emission ─────────────────────────────────────────────────────────

    /// Index the next emitted instruction will occupy.
    pub fn pc(&self) -> usize {
        self.proto.codes.len()
    }

    pub fn emit(&mut self, inst: Instruction) -> usize {
        self.proto.codes.push(inst);
        self.proto.line_info.push(self.line);
        self.proto.codes.len() - 1
    }

    pub fn emit_abc(&mut self, op: OpCode, a: i32, b: i32, c: i32) -> usize {
        self.emit(Instruction::abc(op, a, b, c))
    }

    pub fn emit_abx(&mut self, op: OpCode, a: i32, bx: i32) -> usize {
        self.emit(Instruction::abx(op, a, bx))
    }

    pub fn emit_asbx(&mut self, op: OpCode, a: i32, sbx: i32) -> usize {
        self.emit(Instruction::asbx(op, a, sbx))
    }

    pub fn emit_ax(&mut self, op: OpCode, ax: i32) -> usize {
        self.emit(Instruction::ax(op, ax))
    }

    /// Point the iAsBx instruction at `pc` to `target`.
    pub fn patch_jump(&mut self, pc: usize, target: usize) {
        let inst = self.proto.codes[pc];
        if let Some(op) = inst.opcode() {
            let (a, _) = inst.asbx_args();
            let offset = target as i32 - pc as i32 - 1;
            self.proto.codes[pc] = Instruction::asbx(op, a, offset);
        }
    }

    pub fn finish(self) -> Prototype {
        self.proto
    }

    pub fn build(self) -> Arc<Prototype> {
        Arc::new(self.proto)
    }
}
