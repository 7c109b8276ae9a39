//! Per-function compilation state: locals, upvalues, loop and class records.

use crate::token::Token;
use cinder_core::object::{FunctionId, FunctionKind};
use cinder_core::string::StringId;
use std::collections::HashMap;

/// Hard cap on locals per function; slot operands are one byte.
pub const MAX_LOCALS: usize = 256;
/// Hard cap on upvalues per function.
pub const MAX_UPVALUES: usize = 256;

/// A local variable slot.
#[derive(Clone, Copy, Debug)]
pub struct Local<'src> {
    pub name: Token<'src>,
    /// Scope depth, or -1 while declared but not yet initialized.
    pub depth: i32,
    /// Set when a closure captures this local, so scope exit closes it
    /// instead of popping it.
    pub is_upvalue: bool,
    pub constant: bool,
}

/// An upvalue captured by the function being compiled.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UpvalueDesc {
    /// Local slot in the enclosing function if `is_local`, otherwise an
    /// upvalue index in the enclosing function.
    pub index: u8,
    pub is_local: bool,
    pub constant: bool,
}

/// The innermost loop being compiled, for `break`/`continue`.
#[derive(Clone, Copy, Debug)]
pub struct LoopRecord {
    /// Offset `continue` loops back to; for a `for` loop with an increment
    /// clause this points at the increment, not the condition.
    pub start: usize,
    /// Offset of the first body instruction; `break` placeholders are only
    /// rewritten from here on.
    pub body: usize,
    /// The exit-condition jump to patch, if the loop has one.
    pub end: Option<usize>,
    /// Locals deeper than this are cleaned up by `break`/`continue`.
    pub scope_depth: i32,
}

/// The innermost class body being compiled, for `this`/`super` checks.
#[derive(Clone, Copy, Debug)]
pub struct ClassRecord<'src> {
    pub name: Token<'src>,
    pub has_superclass: bool,
}

/// Compilation state for one function.
///
/// Frames form a stack: the enclosing function is the previous element, the
/// top level is element zero. Upvalue resolution walks this stack by index.
pub struct CompilerFrame<'src> {
    /// The function object being filled in, owned by the Vm arena.
    pub function: FunctionId,
    pub kind: FunctionKind,
    pub locals: Vec<Local<'src>>,
    pub upvalues: Vec<UpvalueDesc>,
    pub scope_depth: i32,
    /// Active loops, innermost last. Reset per function so `break` cannot
    /// escape into an enclosing function's loop.
    pub loops: Vec<LoopRecord>,
    /// Identifier-constant dedup cache for this function's chunk.
    pub string_constants: HashMap<StringId, u8>,
}

impl<'src> CompilerFrame<'src> {
    pub fn new(function: FunctionId, kind: FunctionKind) -> Self {
        let mut frame = CompilerFrame {
            function,
            kind,
            locals: Vec::new(),
            upvalues: Vec::new(),
            scope_depth: 0,
            loops: Vec::new(),
            string_constants: HashMap::new(),
        };

        // Slot zero is reserved: it holds the receiver in a method and the
        // function itself otherwise, where the empty name keeps it
        // unreferencable.
        let slot_zero = if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
            Token::synthetic("this")
        } else {
            Token::synthetic("")
        };
        frame.locals.push(Local {
            name: slot_zero,
            depth: 0,
            is_upvalue: false,
            constant: false,
        });

        frame
    }

    /// Find a local by name, newest first so shadowing works. Returns the
    /// slot index and whether the local is still uninitialized.
    pub fn resolve_local(&self, name: &Token<'src>) -> Option<(u8, bool)> {
        for (i, local) in self.locals.iter().enumerate().rev() {
            if local.name.lexeme == name.lexeme {
                return Some((i as u8, local.depth == -1));
            }
        }
        None
    }

    /// Find an existing upvalue with the same target.
    pub fn find_upvalue(&self, index: u8, is_local: bool) -> Option<u8> {
        self.upvalues
            .iter()
            .position(|up| up.index == index && up.is_local == is_local)
            .map(|i| i as u8)
    }

    pub fn innermost_loop(&self) -> Option<&LoopRecord> {
        self.loops.last()
    }
}
