use lua_core::instruction::{index_k, is_k};
use lua_core::{Constant, OpArgMask, OpCode, OpMode, Prototype};

/// Disassemble a [`Prototype`] into a human-readable listing in the style of
/// `luac -l -l`.
///
/// Recursively disassembles any nested `protos[]` so you see the full picture.
pub fn disassemble(proto: &Prototype) -> String {
    let mut out = String::new();
    disasm_proto(proto, &mut out);
    out
}

fn disasm_proto(proto: &Prototype, out: &mut String) {
    // Header
    let kind = if proto.line_defined == 0 { "main" } else { "function" };
    let name = if proto.source.is_empty() { "=?" } else { proto.source.as_str() };
    out.push_str(&format!(
        "\n{kind} <{name}:{},{}> ({} instructions)\n",
        proto.line_defined,
        proto.last_line_defined,
        proto.codes.len()
    ));
    out.push_str(&format!(
        "{}{} params, {} slots, {} upvalues, {} locals, {} constants, {} functions\n",
        proto.num_params,
        if proto.is_vararg { "+" } else { "" },
        proto.max_register_size,
        proto.upvalues.len(),
        proto.loc_vars.len(),
        proto.constants.len(),
        proto.protos.len()
    ));

    // Instructions
    for (pc, inst) in proto.codes.iter().enumerate() {
        let line = proto
            .line_at(pc)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        let comment = inst
            .opcode()
            .map(|op| operand_comment(proto, op, *inst, pc))
            .unwrap_or_default();
        out.push_str(&format!("\t{}\t[{line}]\t{inst}{comment}\n", pc + 1));
    }

    // Constants pool
    out.push_str(&format!("constants ({}):\n", proto.constants.len()));
    for (i, k) in proto.constants.iter().enumerate() {
        out.push_str(&format!("\t{}\t{}\n", i + 1, fmt_constant(k)));
    }

    out.push_str(&format!("locals ({}):\n", proto.loc_vars.len()));
    for (i, var) in proto.loc_vars.iter().enumerate() {
        out.push_str(&format!(
            "\t{i}\t{}\t{}\t{}\n",
            var.name,
            var.start_pc + 1,
            var.end_pc + 1
        ));
    }

    // Upvalue descriptors
    out.push_str(&format!("upvalues ({}):\n", proto.upvalues.len()));
    for (i, uv) in proto.upvalues.iter().enumerate() {
        let name = proto.upvalue_names.get(i).map(String::as_str).unwrap_or("-");
        out.push_str(&format!("\t{i}\t{name}\t{}\t{}\n", uv.in_stack as u8, uv.index));
    }

    // Nested protos
    for sub in &proto.protos {
        disasm_proto(sub, out);
    }
}

/// `luac`-style trailing `; comment` naming constants and jump targets.
fn operand_comment(proto: &Prototype, op: OpCode, inst: lua_core::Instruction, pc: usize) -> String {
    let info = op.info();
    match info.mode {
        OpMode::IABx if info.arg_b == OpArgMask::K => {
            let (_, bx) = inst.abx_args();
            format!("\t; {}", constant_at(proto, bx))
        }
        OpMode::IAsBx => {
            let (_, sbx) = inst.asbx_args();
            format!("\t; to {}", pc as i32 + sbx + 2)
        }
        OpMode::IABC => {
            let (_, b, c) = inst.abc_args();
            let mut parts = Vec::new();
            if op == OpCode::GetTabUp || op == OpCode::GetUpval || op == OpCode::SetUpval {
                if let Some(name) = proto.upvalue_names.get(b as usize) {
                    parts.push(name.clone());
                }
            }
            if op == OpCode::SetTabUp {
                let (a, _, _) = inst.abc_args();
                if let Some(name) = proto.upvalue_names.get(a as usize) {
                    parts.push(name.clone());
                }
            }
            for (arg, mask) in [(b, info.arg_b), (c, info.arg_c)] {
                if mask == OpArgMask::K && is_k(arg) {
                    parts.push(constant_at(proto, index_k(arg)));
                }
            }
            if parts.is_empty() {
                String::new()
            } else {
                format!("\t; {}", parts.join(" "))
            }
        }
        _ => String::new(),
    }
}

fn constant_at(proto: &Prototype, idx: i32) -> String {
    proto
        .constants
        .get(idx as usize)
        .map(fmt_constant)
        .unwrap_or_else(|| "?".to_string())
}

fn fmt_constant(k: &Constant) -> String {
    match k {
        Constant::Nil => "nil".to_string(),
        Constant::Boolean(b) => b.to_string(),
        Constant::Integer(n) => n.to_string(),
        Constant::Float(f) => lua_core::number::format_float(*f),
        Constant::String(s) => format!("{s:?}"),
    }
}
