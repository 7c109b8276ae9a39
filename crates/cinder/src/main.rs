use std::process::ExitCode;

use cinder_compiler::compiler;
use cinder_compiler::disasm;
use cinder_core::vm::Vm;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut script_file: Option<String> = None;
    let mut list_bytecode = false;
    let mut parse_only = false;
    let mut show_version = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-v" | "--version" => {
                show_version = true;
                i += 1;
            }
            "-l" | "--list" => {
                list_bytecode = true;
                i += 1;
            }
            "-p" | "--parse-only" => {
                parse_only = true;
                i += 1;
            }
            other => {
                if other.starts_with('-') {
                    eprintln!("cinder: unrecognized option '{other}'");
                    return ExitCode::FAILURE;
                }
                script_file = Some(other.to_string());
                i += 1;
            }
        }
    }

    if show_version {
        println!("Cinder {}", env!("CARGO_PKG_VERSION"));
        if script_file.is_none() {
            return ExitCode::SUCCESS;
        }
    }

    let Some(path) = script_file else {
        eprintln!("usage: cinder [-v] [-l] [-p] script");
        return ExitCode::FAILURE;
    };

    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cinder: cannot read '{path}': {e}");
            return ExitCode::FAILURE;
        }
    };

    let module_name = std::path::Path::new(&path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("main");

    let mut vm = Vm::new();
    let module = vm.new_module(module_name);

    let function = match compiler::compile(&mut vm, module, &source) {
        Ok(function) => function,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if parse_only {
        return ExitCode::SUCCESS;
    }

    if list_bytecode {
        print!("{}", disasm::disassemble(&vm, function));
    }

    ExitCode::SUCCESS
}
