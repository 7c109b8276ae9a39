use cinder_compiler::compiler::compile;
use cinder_compiler::opcode::OpCode;
use cinder_core::chunk::Chunk;
use cinder_core::object::FunctionId;
use cinder_core::value::Value;
use cinder_core::vm::Vm;

/// Compile a source string and return the Vm + top-level function.
pub fn compile_src(source: &str) -> (Vm, FunctionId) {
    let mut vm = Vm::new();
    let module = vm.new_module("test");
    let function = compile(&mut vm, module, source)
        .unwrap_or_else(|e| panic!("compile failed: {e}\nsource:\n{source}"));
    (vm, function)
}

/// Compile a source string and expect an error; returns the rendered
/// diagnostics.
pub fn compile_src_err(source: &str) -> String {
    let mut vm = Vm::new();
    let module = vm.new_module("test");
    match compile(&mut vm, module, source) {
        Err(e) => e.to_string(),
        Ok(_) => panic!("expected compile error, got success\nsource:\n{source}"),
    }
}

/// Decode a chunk into `(offset, opcode)` pairs, walking operand widths.
pub fn decode(vm: &Vm, chunk: &Chunk) -> Vec<(usize, OpCode)> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < chunk.code.len() {
        let op = OpCode::from_byte(chunk.code[offset])
            .unwrap_or_else(|| panic!("bad opcode byte {} at {offset}", chunk.code[offset]));
        out.push((offset, op));

        let operands = match op.fixed_operands() {
            Some(n) => n,
            None => match op {
                OpCode::Closure => {
                    let constant = chunk.code[offset + 1] as usize;
                    match chunk.constants[constant] {
                        Value::Function(f) => 1 + 2 * vm.function(f).upvalue_count as usize,
                        _ => panic!("CLOSURE operand {constant} is not a function"),
                    }
                }
                OpCode::ImportFrom => 1 + chunk.code[offset + 1] as usize,
                _ => unreachable!(),
            },
        };
        offset += 1 + operands;
    }
    out
}

/// Just the opcodes of a chunk, in order.
pub fn ops(vm: &Vm, chunk: &Chunk) -> Vec<OpCode> {
    decode(vm, chunk).into_iter().map(|(_, op)| op).collect()
}

/// Opcodes of the top-level chunk of a compiled source.
pub fn compile_ops(source: &str) -> Vec<OpCode> {
    let (vm, function) = compile_src(source);
    ops(&vm, &vm.function(function).chunk)
}

/// All number constants in the pool, in order.
pub fn number_constants(chunk: &Chunk) -> Vec<f64> {
    chunk
        .constants
        .iter()
        .filter_map(|v| v.as_number())
        .collect()
}

/// All string constants in the pool, in order.
pub fn string_constants(vm: &Vm, chunk: &Chunk) -> Vec<String> {
    chunk
        .constants
        .iter()
        .filter_map(|v| v.as_string())
        .map(|id| vm.strings.get_str(id).to_string())
        .collect()
}

/// All function constants in the pool, in order.
pub fn function_constants(chunk: &Chunk) -> Vec<FunctionId> {
    chunk
        .constants
        .iter()
        .filter_map(|v| v.as_function())
        .collect()
}

/// The 16-bit big-endian operand of the jump at `offset`.
pub fn jump_operand(chunk: &Chunk, offset: usize) -> u16 {
    u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]])
}
