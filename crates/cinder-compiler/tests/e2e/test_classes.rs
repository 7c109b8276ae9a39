use super::helpers::*;
use cinder_compiler::opcode::OpCode::*;

#[test]
fn e2e_empty_class() {
    let (vm, function) = compile_src("class A {}");
    let chunk = &vm.function(function).chunk;
    assert_eq!(ops(&vm, chunk), vec![Class, DefineModule, Nil, Return]);
    assert_eq!(string_constants(&vm, chunk), vec!["A".to_string()]);
}

#[test]
fn e2e_method_emission() {
    let (vm, function) = compile_src("class A { greet() { return 1; } }");
    let chunk = &vm.function(function).chunk;
    assert_eq!(
        ops(&vm, chunk),
        vec![Class, Closure, Method, DefineModule, Nil, Return]
    );

    let decoded = decode(&vm, chunk);
    let (method_offset, _) = *decoded.iter().find(|(_, op)| *op == Method).unwrap();
    let name_constant = chunk.code[method_offset + 1] as usize;
    let name = chunk.constants[name_constant].as_string().unwrap();
    assert_eq!(vm.strings.get_bytes(name), b"greet");
}

#[test]
fn e2e_class_variable() {
    let (vm, function) = compile_src("class A { var count = 0; }");
    let chunk = &vm.function(function).chunk;
    assert_eq!(
        ops(&vm, chunk),
        vec![Class, Constant, SetClassVar, DefineModule, Nil, Return]
    );
}

#[test]
fn e2e_init_auto_returns_this() {
    let (vm, function) = compile_src("class A { init() {} }");
    let init = function_constants(&vm.function(function).chunk)[0];
    let chunk = &vm.function(init).chunk;
    // The implicit return loads slot 0, which holds the receiver.
    assert_eq!(ops(&vm, chunk), vec![GetLocal, Return]);
    assert_eq!(chunk.code[1], 0);
}

#[test]
fn e2e_bare_return_in_init_returns_this() {
    let (vm, function) = compile_src("class A { init() { return; } }");
    let init = function_constants(&vm.function(function).chunk)[0];
    let chunk = &vm.function(init).chunk;
    assert_eq!(ops(&vm, chunk), vec![GetLocal, Return, GetLocal, Return]);
}

#[test]
fn e2e_return_value_from_init_rejected() {
    let err = compile_src_err("class A { init() { return 1; } }");
    assert!(
        err.contains("Cannot return a value from an initializer."),
        "{err}"
    );
}

#[test]
fn e2e_init_var_parameter_records_property() {
    let (vm, function) = compile_src("class A { init(var x) {} }");
    let init_id = function_constants(&vm.function(function).chunk)[0];
    let init = vm.function(init_id);

    assert_eq!(init.property_count, 1);
    assert_eq!(init.property_indexes, vec![0]);
    let name_constant = init.property_constants[0] as usize;
    let name = init.chunk.constants[name_constant].as_string().unwrap();
    assert_eq!(vm.strings.get_bytes(name), b"x");
}

#[test]
fn e2e_init_mixed_var_parameters() {
    let (vm, function) = compile_src("class A { init(a, var b, c, var d) {} }");
    let init_id = function_constants(&vm.function(function).chunk)[0];
    let init = vm.function(init_id);
    assert_eq!(init.property_count, 2);
    assert_eq!(init.property_indexes, vec![1, 3]);
    assert_eq!(init.arity, 4);
}

#[test]
fn e2e_spread_in_init_rejected() {
    let err = compile_src_err("class A { init(...xs) {} }");
    assert!(
        err.contains("spread parameter cannot be used in a class constructor"),
        "{err}"
    );
}

#[test]
fn e2e_method_this_resolves_to_slot_zero() {
    let (vm, function) = compile_src("class A { get() { return this; } }");
    let method = function_constants(&vm.function(function).chunk)[0];
    let chunk = &vm.function(method).chunk;
    assert_eq!(ops(&vm, chunk), vec![GetLocal, Return, Nil, Return]);
    assert_eq!(chunk.code[1], 0);
}

#[test]
fn e2e_property_access() {
    let (vm, function) = compile_src("var a = 1; a.field;");
    let chunk = &vm.function(function).chunk;
    assert!(ops(&vm, chunk).contains(&GetProperty));
}

#[test]
fn e2e_property_assignment() {
    let ops = compile_ops("var a = 1; a.field = 2;");
    assert!(ops.contains(&SetProperty));
}

#[test]
fn e2e_property_compound_assignment() {
    let (vm, function) = compile_src("var a = 1; a.field += 2;");
    let chunk = &vm.function(function).chunk;
    let kinds = ops(&vm, chunk);
    // Read without popping the receiver, add, write back.
    let no_pop = kinds.iter().position(|op| *op == GetPropertyNoPop).unwrap();
    let add = kinds.iter().position(|op| *op == Add).unwrap();
    let set = kinds.iter().position(|op| *op == SetProperty).unwrap();
    assert!(no_pop < add && add < set);
}

#[test]
fn e2e_method_invoke_fused() {
    let (vm, function) = compile_src("var a = 1; a.step(2, 3);");
    let chunk = &vm.function(function).chunk;
    let kinds = ops(&vm, chunk);
    assert!(kinds.contains(&Invoke));
    assert!(!kinds.contains(&GetProperty));

    let decoded = decode(&vm, chunk);
    let (invoke_offset, _) = *decoded.iter().find(|(_, op)| *op == Invoke).unwrap();
    assert_eq!(chunk.code[invoke_offset + 1], 2); // argc
    let name_constant = chunk.code[invoke_offset + 2] as usize;
    let name = chunk.constants[name_constant].as_string().unwrap();
    assert_eq!(vm.strings.get_bytes(name), b"step");
    assert_eq!(chunk.code[invoke_offset + 3], 0); // unpack
}

#[test]
fn e2e_subclass_emission() {
    let (vm, function) = compile_src("class A {} class B < A {}");
    let chunk = &vm.function(function).chunk;
    assert_eq!(
        ops(&vm, chunk),
        vec![Class, DefineModule, GetModule, Subclass, EndClass, DefineModule, Nil, Return]
    );
}

#[test]
fn e2e_super_method_call() {
    let (vm, function) = compile_src(
        "class A { go() {} } class B < A { go() { return super.go(); } }",
    );
    let module_chunk = &vm.function(function).chunk;
    // B's go is the last function constant in the module chunk.
    let go_id = *function_constants(module_chunk).last().unwrap();
    let go = vm.function(go_id);
    let kinds = ops(&vm, &go.chunk);

    // Receiver, then the captured superclass, then the fused super call.
    assert_eq!(kinds[0], GetLocal);
    assert_eq!(kinds[1], GetUpvalue);
    assert_eq!(kinds[2], Super);
    assert_eq!(go.upvalue_count, 1);
}

#[test]
fn e2e_super_property_access() {
    let (vm, function) = compile_src(
        "class A { go() {} } class B < A { peek() { return super.go; } }",
    );
    let module_chunk = &vm.function(function).chunk;
    let peek_id = *function_constants(module_chunk).last().unwrap();
    let kinds = ops(&vm, &vm.function(peek_id).chunk);
    assert!(kinds.contains(&GetSuper));
}

#[test]
fn e2e_this_outside_class_rejected() {
    let err = compile_src_err("this;");
    assert!(err.contains("Cannot utilise 'this' outside of a class."), "{err}");
}

#[test]
fn e2e_this_outside_class_in_function_rejected() {
    let err = compile_src_err("def f() { return this; }");
    assert!(err.contains("Cannot utilise 'this' outside of a class."), "{err}");
}

#[test]
fn e2e_this_in_nested_function_captures_receiver() {
    let (vm, function) = compile_src(
        "class A { make() { def inner() { return this; } return inner; } }",
    );
    let module_chunk = &vm.function(function).chunk;
    let make_id = function_constants(module_chunk)[0];
    let inner_id = function_constants(&vm.function(make_id).chunk)[0];
    let inner = vm.function(inner_id);
    assert_eq!(inner.upvalue_count, 1);
    assert!(ops(&vm, &inner.chunk).contains(&GetUpvalue));
}

#[test]
fn e2e_super_outside_class_rejected() {
    let err = compile_src_err("super.x;");
    assert!(err.contains("Cannot utilise 'super' outside of a class."), "{err}");
}

#[test]
fn e2e_super_without_superclass_rejected() {
    let err = compile_src_err("class A { go() { return super.go(); } }");
    assert!(
        err.contains("Cannot utilise 'super' in a class with no superclass."),
        "{err}"
    );
}
