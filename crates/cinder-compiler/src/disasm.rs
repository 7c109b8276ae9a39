/// Bytecode disassembler.
use crate::opcode::OpCode;
use cinder_core::chunk::Chunk;
use cinder_core::object::FunctionId;
use cinder_core::value::Value;
use cinder_core::vm::Vm;
use std::fmt::Write;

/// Disassemble a function and every nested function into a listing.
pub fn disassemble(vm: &Vm, function: FunctionId) -> String {
    let mut out = String::new();
    disassemble_function(&mut out, vm, function);
    out
}

fn disassemble_function(out: &mut String, vm: &Vm, id: FunctionId) {
    let function = vm.function(id);
    let name = match function.name {
        Some(name) => vm.strings.get_str(name).to_string(),
        None => format!("<module {}>", vm.strings.get_str(vm.module(function.module).name)),
    };

    writeln!(
        out,
        "== {} ({} params, {} optional{}, {} upvalues, {} constants) ==",
        name,
        function.arity,
        function.arity_optional,
        if function.is_variadic { ", variadic" } else { "" },
        function.upvalue_count,
        function.chunk.constants.len(),
    )
    .unwrap();

    let chunk = &function.chunk;
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(out, vm, chunk, offset);
    }

    if !chunk.constants.is_empty() {
        writeln!(out, "constants ({}):", chunk.constants.len()).unwrap();
        for (i, constant) in chunk.constants.iter().enumerate() {
            writeln!(out, "  {:>4} {}", i, format_value(vm, *constant)).unwrap();
        }
    }

    // Nested functions live in the constant pool.
    for constant in &chunk.constants {
        if let Value::Function(nested) = constant {
            writeln!(out).unwrap();
            disassemble_function(out, vm, *nested);
        }
    }
}

/// Disassemble the instruction at `offset`, returning the next offset.
pub fn disassemble_instruction(out: &mut String, vm: &Vm, chunk: &Chunk, offset: usize) -> usize {
    write!(out, "{offset:04} ").unwrap();

    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        write!(out, "   | ").unwrap();
    } else {
        write!(out, "{:>4} ", chunk.lines[offset]).unwrap();
    }

    let op = match OpCode::from_byte(chunk.code[offset]) {
        Some(op) => op,
        None => {
            writeln!(out, "Unknown opcode {}", chunk.code[offset]).unwrap();
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::GetModule
        | OpCode::SetModule
        | OpCode::DefineModule
        | OpCode::GetProperty
        | OpCode::GetPropertyNoPop
        | OpCode::SetProperty
        | OpCode::SetClassVar
        | OpCode::GetSuper
        | OpCode::Method
        | OpCode::Import
        | OpCode::Class
        | OpCode::Subclass => {
            let constant = chunk.code[offset + 1];
            let resolved = chunk
                .constants
                .get(constant as usize)
                .map(|v| format_value(vm, *v))
                .unwrap_or_else(|| "<out of range>".to_string());
            writeln!(out, "{:<20} {constant:>4} ; {resolved}", op.name()).unwrap();
            offset + 2
        }

        OpCode::GetLocal | OpCode::SetLocal | OpCode::GetUpvalue | OpCode::SetUpvalue => {
            writeln!(out, "{:<20} {:>4}", op.name(), chunk.code[offset + 1]).unwrap();
            offset + 2
        }

        OpCode::Jump | OpCode::JumpIfFalse => {
            let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
            let target = offset + 3 + jump as usize;
            writeln!(out, "{:<20} {:>4} -> {target}", op.name(), jump).unwrap();
            offset + 3
        }

        OpCode::Loop => {
            let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
            let target = (offset + 3).wrapping_sub(jump as usize);
            writeln!(out, "{:<20} {:>4} -> {target}", op.name(), jump).unwrap();
            offset + 3
        }

        OpCode::Break => {
            // An unpatched placeholder only appears mid-compile.
            writeln!(out, "{:<20}", op.name()).unwrap();
            offset + 3
        }

        OpCode::Call => {
            let argc = chunk.code[offset + 1];
            let unpack = chunk.code[offset + 2];
            writeln!(out, "{:<20} {argc:>4} unpack={unpack}", op.name()).unwrap();
            offset + 3
        }

        OpCode::DefineOptional => {
            writeln!(
                out,
                "{:<20} {:>4} {}",
                op.name(),
                chunk.code[offset + 1],
                chunk.code[offset + 2]
            )
            .unwrap();
            offset + 3
        }

        OpCode::Invoke | OpCode::Super => {
            let argc = chunk.code[offset + 1];
            let name = chunk.code[offset + 2];
            let unpack = chunk.code[offset + 3];
            let resolved = chunk
                .constants
                .get(name as usize)
                .map(|v| format_value(vm, *v))
                .unwrap_or_else(|| "<out of range>".to_string());
            writeln!(out, "{:<20} ({argc} args) {name:>4} ; {resolved} unpack={unpack}", op.name())
                .unwrap();
            offset + 4
        }

        OpCode::Closure => {
            let constant = chunk.code[offset + 1];
            let upvalue_count = match chunk.constants.get(constant as usize) {
                Some(Value::Function(f)) => vm.function(*f).upvalue_count as usize,
                _ => 0,
            };
            let resolved = chunk
                .constants
                .get(constant as usize)
                .map(|v| format_value(vm, *v))
                .unwrap_or_else(|| "<out of range>".to_string());
            writeln!(out, "{:<20} {constant:>4} ; {resolved}", op.name()).unwrap();
            let mut next = offset + 2;
            for _ in 0..upvalue_count {
                let is_local = chunk.code[next];
                let index = chunk.code[next + 1];
                writeln!(
                    out,
                    "{next:04}    |   {:>18} {index}",
                    if is_local == 1 { "local" } else { "upvalue" }
                )
                .unwrap();
                next += 2;
            }
            next
        }

        OpCode::ImportFrom => {
            let count = chunk.code[offset + 1] as usize;
            write!(out, "{:<20} {count:>4} ;", op.name()).unwrap();
            for i in 0..count {
                let name = chunk.code[offset + 2 + i];
                let resolved = chunk
                    .constants
                    .get(name as usize)
                    .map(|v| format_value(vm, *v))
                    .unwrap_or_else(|| "<out of range>".to_string());
                write!(out, " {resolved}").unwrap();
            }
            writeln!(out).unwrap();
            offset + 2 + count
        }

        _ => {
            writeln!(out, "{}", op.name()).unwrap();
            offset + 1
        }
    }
}

fn format_value(vm: &Vm, value: Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(id) => format!("\"{}\"", vm.strings.get_str(id)),
        Value::Function(id) => {
            let function = vm.function(id);
            match function.name {
                Some(name) => format!("<fn {}>", vm.strings.get_str(name)),
                None => "<fn>".to_string(),
            }
        }
    }
}
