use super::helpers::*;
use cinder_compiler::opcode::OpCode::*;

#[test]
fn e2e_literal_arithmetic_folds_to_one_constant() {
    let (vm, function) = compile_src("1 + 2;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(ops(&vm, chunk), vec![Constant, Pop, Nil, Return]);
    assert_eq!(number_constants(chunk), vec![3.0]);
    assert_eq!(chunk.constants.len(), 1);
}

#[test]
fn e2e_fold_chains_left_to_right() {
    let (vm, function) = compile_src("1 + 2 - 4;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![-1.0]);
    assert_eq!(ops(&vm, chunk), vec![Constant, Pop, Nil, Return]);
}

#[test]
fn e2e_fold_respects_precedence() {
    let (vm, function) = compile_src("1 + 2 * 3;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![7.0]);
}

#[test]
fn e2e_fold_multiply_divide() {
    let (vm, function) = compile_src("10 * 4 / 8;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![5.0]);
}

#[test]
fn e2e_grouping_blocks_fold() {
    // The parenthesis means the right operand no longer reads as a literal,
    // so an ADD survives to runtime.
    assert!(compile_ops("1 + (2);").contains(&Add));
}

#[test]
fn e2e_no_fold_with_variable_operand() {
    let source = "var a = 1; var b = a + 2;";
    let (vm, function) = compile_src(source);
    let chunk = &vm.function(function).chunk;
    assert!(ops(&vm, chunk).contains(&Add));
}

#[test]
fn e2e_unary_minus_folds_into_pool() {
    let (vm, function) = compile_src("-5;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![-5.0]);
    assert!(!ops(&vm, chunk).contains(&Negate));
}

#[test]
fn e2e_double_negation_folds() {
    let (vm, function) = compile_src("--5;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![5.0]);
}

#[test]
fn e2e_not_true_folds_to_false() {
    assert_eq!(compile_ops("not true;"), vec![False, Pop, Nil, Return]);
}

#[test]
fn e2e_not_false_folds_to_true() {
    assert_eq!(compile_ops("not false;"), vec![True, Pop, Nil, Return]);
}

#[test]
fn e2e_not_expression_not_folded() {
    let ops = compile_ops("not (1 == 2);");
    assert!(ops.contains(&Not));
    assert!(ops.contains(&Equal));
}

#[test]
fn e2e_negate_variable_not_folded() {
    let ops = compile_ops("var a = 1; -a;");
    assert!(ops.contains(&Negate));
}

#[test]
fn e2e_comparison_desugaring() {
    assert_eq!(
        compile_ops("1 >= 2;"),
        vec![Constant, Constant, Less, Not, Pop, Nil, Return]
    );
    assert_eq!(
        compile_ops("1 <= 2;"),
        vec![Constant, Constant, Greater, Not, Pop, Nil, Return]
    );
    assert_eq!(
        compile_ops("1 != 2;"),
        vec![Constant, Constant, Equal, Not, Pop, Nil, Return]
    );
}

#[test]
fn e2e_mod_and_pow() {
    assert!(compile_ops("5 % 2;").contains(&Mod));
    assert!(compile_ops("2 ** 3;").contains(&Pow));
}

#[test]
fn e2e_bitwise_operators() {
    let ops = compile_ops("1 & 2 | 3 ^ 4;");
    assert!(ops.contains(&BitwiseAnd));
    assert!(ops.contains(&BitwiseOr));
    assert!(ops.contains(&BitwiseXor));
}

#[test]
fn e2e_bitwise_binds_tighter_than_equality() {
    // (1 & 2) == 3, so EQUAL must be the last operator emitted.
    let ops = compile_ops("1 & 2 == 3;");
    let and_at = ops.iter().position(|op| *op == BitwiseAnd).unwrap();
    let equal_at = ops.iter().position(|op| *op == Equal).unwrap();
    assert!(and_at < equal_at);
}

#[test]
fn e2e_and_short_circuit_shape() {
    assert_eq!(
        compile_ops("true and false;"),
        vec![True, JumpIfFalse, Pop, False, Pop, Nil, Return]
    );
}

#[test]
fn e2e_or_short_circuit_shape() {
    assert_eq!(
        compile_ops("true or false;"),
        vec![True, JumpIfFalse, Jump, Pop, False, Pop, Nil, Return]
    );
}

#[test]
fn e2e_number_underscores_stripped() {
    let (vm, function) = compile_src("1_000_000;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![1_000_000.0]);
}

#[test]
fn e2e_fractional_number() {
    let (vm, function) = compile_src("3.25;");
    let chunk = &vm.function(function).chunk;
    assert_eq!(number_constants(chunk), vec![3.25]);
}

#[test]
fn e2e_string_escapes_processed() {
    let (vm, function) = compile_src("\"a\\nb\\tc\";");
    let chunk = &vm.function(function).chunk;
    assert_eq!(string_constants(&vm, chunk), vec!["a\nb\tc".to_string()]);
}

#[test]
fn e2e_unknown_escape_kept_verbatim() {
    let (vm, function) = compile_src("\"a\\qb\";");
    let chunk = &vm.function(function).chunk;
    assert_eq!(string_constants(&vm, chunk), vec!["a\\qb".to_string()]);
}

#[test]
fn e2e_raw_string_suppresses_escapes() {
    let (vm, function) = compile_src("r\"a\\nb\";");
    let chunk = &vm.function(function).chunk;
    assert_eq!(string_constants(&vm, chunk), vec!["a\\nb".to_string()]);
}

#[test]
fn e2e_single_quoted_string() {
    let (vm, function) = compile_src("'hi';");
    let chunk = &vm.function(function).chunk;
    assert_eq!(string_constants(&vm, chunk), vec!["hi".to_string()]);
}

#[test]
fn e2e_invalid_assignment_target() {
    let err = compile_src_err("var a = 1; var b = 2; a + b = 3;");
    assert!(err.contains("Invalid assignment target."), "{err}");
}

#[test]
fn e2e_jump_lands_on_else_pop() {
    let (vm, function) = compile_src("if (true) 1; else 2;");
    let chunk = &vm.function(function).chunk;
    let decoded = decode(&vm, chunk);

    // TRUE, JUMP_IF_FALSE, POP, CONSTANT, POP, JUMP, POP, CONSTANT, POP
    let kinds: Vec<_> = decoded.iter().map(|(_, op)| *op).collect();
    assert_eq!(
        kinds,
        vec![True, JumpIfFalse, Pop, Constant, Pop, Jump, Pop, Constant, Pop, Nil, Return]
    );

    // The conditional jump lands exactly on the else branch's POP.
    let (jif_offset, _) = decoded[1];
    let target = jif_offset + 3 + jump_operand(chunk, jif_offset) as usize;
    let (else_pop_offset, _) = decoded[6];
    assert_eq!(target, else_pop_offset);
}
