use super::helpers::*;
use cinder_compiler::compiler::compile;
use cinder_core::vm::Vm;

#[test]
fn e2e_error_unterminated_string() {
    let err = compile_src_err("var x = \"hello");
    assert!(err.contains("Unterminated string."), "{err}");
}

#[test]
fn e2e_error_unexpected_character() {
    let err = compile_src_err("var x = @;");
    assert!(err.contains("Unexpected character."), "{err}");
}

#[test]
fn e2e_error_break_outside_loop() {
    let err = compile_src_err("break;");
    assert!(err.contains("Cannot utilise 'break' outside of a loop."), "{err}");
}

#[test]
fn e2e_error_continue_outside_loop() {
    let err = compile_src_err("continue;");
    assert!(
        err.contains("Cannot utilise 'continue' outside of a loop."),
        "{err}"
    );
}

#[test]
fn e2e_error_break_in_function_inside_loop_body() {
    // The loop does not reach into a nested function.
    let err = compile_src_err("while (true) { def f() { break; } }");
    assert!(err.contains("Cannot utilise 'break' outside of a loop."), "{err}");
}

#[test]
fn e2e_error_missing_semicolon() {
    let err = compile_src_err("var x = 1");
    assert!(err.contains("Expect ';' after variable declaration."), "{err}");
}

#[test]
fn e2e_error_expect_expression() {
    let err = compile_src_err("var x = ;");
    assert!(err.contains("Expect expression."), "{err}");
}

#[test]
fn e2e_error_renders_module_line_and_lexeme() {
    let mut vm = Vm::new();
    let module = vm.new_module("main");
    let err = compile(&mut vm, module, "var x = 1;\nvar = 2;").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("File 'main'"), "{rendered}");
    assert!(rendered.contains("line 2"), "{rendered}");
    assert!(rendered.contains("Error at '='"), "{rendered}");
}

#[test]
fn e2e_error_at_end_renders_end() {
    let err = compile_src_err("def f(");
    assert!(err.contains("Error at end:"), "{err}");
}

#[test]
fn e2e_synchronize_reports_later_statements() {
    // One diagnostic per statement: panic mode ends at each boundary.
    let err = compile_src_err("var = 1;\nvar = 2;\nvar = 3;");
    assert_eq!(err.lines().count(), 3, "{err}");
}

#[test]
fn e2e_cascading_errors_suppressed_within_statement() {
    // Everything after the first error in the statement stays quiet.
    let err = compile_src_err("var x = (((;");
    assert_eq!(err.lines().count(), 1, "{err}");
}

#[test]
fn e2e_no_function_returned_on_error() {
    let mut vm = Vm::new();
    let module = vm.new_module("test");
    assert!(compile(&mut vm, module, "var x = ;").is_err());
}

#[test]
fn e2e_constant_pool_255_ok() {
    // 127 declarations consume two pool slots each (name + number), and a
    // final one brings the total to 256 entries exactly.
    let mut source = String::new();
    for i in 0..128 {
        source.push_str(&format!("var v{i} = {}.5;\n", i));
    }
    let (vm, function) = compile_src(&source);
    assert_eq!(vm.function(function).chunk.constants.len(), 256);
}

#[test]
fn e2e_constant_pool_overflow() {
    let mut source = String::new();
    for i in 0..129 {
        source.push_str(&format!("var v{i} = {}.5;\n", i));
    }
    let err = compile_src_err(&source);
    assert!(err.contains("Too many constants in one chunk."), "{err}");
}

#[test]
fn e2e_nested_function_gets_fresh_pool() {
    // Each chunk has its own pool, so heavy use in one function does not
    // starve a sibling.
    let mut source = String::new();
    source.push_str("def a() {\n");
    for i in 0..100 {
        source.push_str(&format!("var v{i} = {}.5;\n", i));
    }
    source.push_str("}\ndef b() {\n");
    for i in 0..100 {
        source.push_str(&format!("var v{i} = {}.5;\n", i));
    }
    source.push_str("}\n");
    compile_src(&source);
}
