//! Single-pass compiler: Cinder source → bytecode chunk.
//!
//! There is no AST. A Pratt expression parser and a recursive-descent
//! statement parser pull tokens from the scanner and append bytecode to the
//! active function's chunk as they go, folding literal arithmetic through a
//! peephole over the last few emitted bytes. Nested functions push a
//! [`CompilerFrame`] each; upvalue capture flattens through every
//! intermediate frame so a deeply nested closure can reach any ancestor's
//! local.

pub mod frame;

use crate::opcode::OpCode;
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use cinder_core::chunk::Chunk;
use cinder_core::object::{AccessLevel, FunctionId, FunctionKind, ModuleId};
use cinder_core::value::Value;
use cinder_core::vm::Vm;
use self::frame::{
    ClassRecord, CompilerFrame, Local, LoopRecord, UpvalueDesc, MAX_LOCALS, MAX_UPVALUES,
};
use std::fmt;

/// Where a diagnostic points.
#[derive(Clone, Debug)]
pub enum DiagnosticLocation {
    /// At end of input.
    Eof,
    /// A scanner error; there is no meaningful lexeme.
    Scanner,
    /// At a source token.
    Token(String),
}

/// One rendered compile error.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub line: u32,
    pub location: DiagnosticLocation,
    pub message: String,
}

/// A failed compile: every diagnostic reported before the parser gave up.
#[derive(Clone, Debug)]
pub struct CompileError {
    pub module: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "File '{}', line {}: ", self.module, d.line)?;
            match &d.location {
                DiagnosticLocation::Eof => write!(f, "Error at end: {}", d.message)?,
                DiagnosticLocation::Scanner => write!(f, "Error: {}", d.message)?,
                DiagnosticLocation::Token(lexeme) => {
                    write!(f, "Error at '{}': {}", lexeme, d.message)?
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Operator precedence, lowest to highest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Bitwise,    // & ^ |
    Term,       // + -
    Factor,     // * / %
    Indices,    // **
    Unary,      // not -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Bitwise,
            Bitwise => Term,
            Term => Factor,
            Factor => Indices,
            Indices => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type PrefixFn<'src, 'vm> = fn(&mut Compiler<'src, 'vm>, bool);
type InfixFn<'src, 'vm> = fn(&mut Compiler<'src, 'vm>, Token<'src>, bool);

/// One row of the Pratt rule table.
struct ParseRule<'src, 'vm> {
    prefix: Option<PrefixFn<'src, 'vm>>,
    infix: Option<InfixFn<'src, 'vm>>,
    precedence: Precedence,
}

/// The compiler driver: parser state plus the stack of frames for nested
/// functions being compiled.
pub struct Compiler<'src, 'vm> {
    vm: &'vm mut Vm,
    module: ModuleId,
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<Diagnostic>,
    frames: Vec<CompilerFrame<'src>>,
    classes: Vec<ClassRecord<'src>>,
}

/// Compile one module's source to a function. Public API entry point.
///
/// On any error the compile is poisoned and no function is returned; the
/// error carries every diagnostic emitted before synchronization gave up.
pub fn compile(vm: &mut Vm, module: ModuleId, source: &str) -> Result<FunctionId, CompileError> {
    let mut compiler = Compiler::new(vm, module, source);

    compiler.begin_frame(FunctionKind::TopLevel, AccessLevel::Public);
    compiler.advance();

    if !compiler.match_token(TokenKind::Eof) {
        loop {
            compiler.declaration();
            if compiler.match_token(TokenKind::Eof) {
                break;
            }
        }
    }

    let function = compiler.end_frame();
    let had_error = compiler.had_error;
    let diagnostics = std::mem::take(&mut compiler.diagnostics);
    drop(compiler);

    // Const names only need to outlive the compile unless the REPL keeps
    // defining into the same module.
    if !vm.repl {
        vm.constants.clear();
    }

    if had_error {
        let module_name = vm.strings.get_str(vm.module(module).name).to_string();
        Err(CompileError {
            module: module_name,
            diagnostics,
        })
    } else {
        Ok(function)
    }
}

impl<'src, 'vm> Compiler<'src, 'vm> {
    fn new(vm: &'vm mut Vm, module: ModuleId, source: &'src str) -> Self {
        Compiler {
            vm,
            module,
            scanner: Scanner::new(source),
            previous: Token::none(),
            current: Token::none(),
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            frames: Vec::new(),
            classes: Vec::new(),
        }
    }

    // ---- Error reporting ----

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenKind::Eof => DiagnosticLocation::Eof,
            TokenKind::Error => DiagnosticLocation::Scanner,
            _ => DiagnosticLocation::Token(token.lexeme.to_string()),
        };
        self.diagnostics.push(Diagnostic {
            line: token.line,
            location,
            message: message.to_string(),
        });
        self.had_error = true;
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    // ---- Token plumbing ----

    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let token = self.current;
            self.error_at(token, token.lexeme);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ---- Frame access ----

    fn frame(&self) -> &CompilerFrame<'src> {
        self.frames.last().unwrap()
    }

    fn frame_mut(&mut self) -> &mut CompilerFrame<'src> {
        self.frames.last_mut().unwrap()
    }

    fn current_chunk(&self) -> &Chunk {
        &self.vm.function(self.frame().function).chunk
    }

    fn current_chunk_mut(&mut self) -> &mut Chunk {
        let function = self.frame().function;
        &mut self.vm.function_mut(function).chunk
    }

    // ---- Emission ----

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk_mut().write(byte, line);
    }

    fn emit_bytes(&mut self, byte1: u8, byte2: u8) {
        self.emit_byte(byte1);
        self.emit_byte(byte2);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    /// Emit a backward jump to `loop_start`.
    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);

        let offset = self.current_chunk().len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    /// Emit `instruction` followed by a 16-bit placeholder, returning the
    /// placeholder's offset for a later `patch_jump`.
    fn emit_jump(&mut self, instruction: OpCode) -> usize {
        self.emit_op(instruction);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().len() - 2
    }

    /// Backfill a jump placeholder so it lands at the current end of code.
    fn patch_jump(&mut self, offset: usize) {
        // -2 adjusts for the operand bytes of the jump itself.
        let jump = self.current_chunk().len() - offset - 2;

        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }

        let chunk = self.current_chunk_mut();
        chunk.code[offset] = ((jump >> 8) & 0xff) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_return(&mut self) {
        // An initializer automatically returns "this".
        if self.frame().kind == FunctionKind::Initializer {
            self.emit_op(OpCode::GetLocal);
            self.emit_byte(0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.current_chunk_mut().add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let constant = self.make_constant(value);
        self.emit_op(OpCode::Constant);
        self.emit_byte(constant);
    }

    /// Pool index for an identifier, deduplicated through the frame's
    /// string-constant cache.
    fn identifier_constant(&mut self, name: Token<'src>) -> u8 {
        let id = self.vm.intern(name.lexeme.as_bytes());
        if let Some(&index) = self.frame().string_constants.get(&id) {
            return index;
        }
        let index = self.make_constant(Value::String(id));
        self.frame_mut().string_constants.insert(id, index);
        index
    }

    // ---- Frames ----

    fn begin_frame(&mut self, kind: FunctionKind, access: AccessLevel) {
        let function = self.vm.new_function(self.module, kind, access);
        if kind != FunctionKind::TopLevel {
            let name = self.vm.intern(self.previous.lexeme.as_bytes());
            self.vm.function_mut(function).name = Some(name);
        }
        self.frames.push(CompilerFrame::new(function, kind));
    }

    /// Close the current frame: emit the implicit return and, when there is
    /// an enclosing frame, emit `CLOSURE` plus the upvalue capture pairs
    /// into it.
    fn end_frame(&mut self) -> FunctionId {
        self.emit_return();

        let closed = self.frames.pop().unwrap();
        let function = closed.function;

        if !self.frames.is_empty() {
            let constant = self.make_constant(Value::Function(function));
            self.emit_op(OpCode::Closure);
            self.emit_byte(constant);

            for upvalue in &closed.upvalues {
                self.emit_byte(u8::from(upvalue.is_local));
                self.emit_byte(upvalue.index);
            }
        }

        function
    }

    // ---- Scopes and variables ----

    fn begin_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let mut captured = Vec::new();
        {
            let frame = self.frame_mut();
            frame.scope_depth -= 1;
            while frame
                .locals
                .last()
                .is_some_and(|local| local.depth > frame.scope_depth)
            {
                captured.push(frame.locals.pop().unwrap().is_upvalue);
            }
        }
        for is_upvalue in captured {
            if is_upvalue {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
        }
    }

    /// Resolve a name against the locals of `frame_index`, newest first.
    /// Reading a local inside its own initializer is an error unless the
    /// lookup comes from a nested function.
    fn resolve_local(
        &mut self,
        frame_index: usize,
        name: &Token<'src>,
        in_function: bool,
    ) -> Option<u8> {
        let (slot, uninitialized) = self.frames[frame_index].resolve_local(name)?;
        if uninitialized && !in_function {
            self.error("Cannot read local variable in its own initializer.");
        }
        Some(slot)
    }

    fn add_upvalue(&mut self, frame_index: usize, index: u8, is_local: bool, constant: bool) -> u8 {
        if let Some(existing) = self.frames[frame_index].find_upvalue(index, is_local) {
            return existing;
        }

        if self.frames[frame_index].upvalues.len() == MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }

        self.frames[frame_index].upvalues.push(UpvalueDesc {
            index,
            is_local,
            constant,
        });
        let function = self.frames[frame_index].function;
        self.vm.function_mut(function).upvalue_count += 1;
        (self.frames[frame_index].upvalues.len() - 1) as u8
    }

    /// Resolve a name as an upvalue of `frame_index`, flattening the capture
    /// through every intermediate enclosing frame.
    fn resolve_upvalue(&mut self, frame_index: usize, name: &Token<'src>) -> Option<u8> {
        if frame_index == 0 {
            return None;
        }
        let parent = frame_index - 1;

        if let Some(slot) = self.resolve_local(parent, name, true) {
            // Mark it captured so scope exit closes it instead of popping.
            self.frames[parent].locals[slot as usize].is_upvalue = true;
            let constant = self.frames[parent].locals[slot as usize].constant;
            return Some(self.add_upvalue(frame_index, slot, true, constant));
        }

        if let Some(upvalue) = self.resolve_upvalue(parent, name) {
            let constant = self.frames[parent].upvalues[upvalue as usize].constant;
            return Some(self.add_upvalue(frame_index, upvalue, false, constant));
        }

        None
    }

    fn add_local(&mut self, name: Token<'src>) {
        if self.frame().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.frame_mut().locals.push(Local {
            name,
            // Declared but not yet defined.
            depth: -1,
            is_upvalue: false,
            constant: false,
        });
    }

    fn declare_variable(&mut self, name: Token<'src>) {
        // Module globals are implicitly declared.
        if self.frame().scope_depth == 0 {
            return;
        }

        let mut redeclared = false;
        {
            let frame = self.frame();
            for local in frame.locals.iter().rev() {
                if local.depth != -1 && local.depth < frame.scope_depth {
                    break;
                }
                if local.name.lexeme == name.lexeme {
                    redeclared = true;
                    break;
                }
            }
        }
        if redeclared {
            self.error_at(name, "Variable with this name already declared in this scope.");
        }

        self.add_local(name);
    }

    /// Parse a binding name. Returns the name-constant index for a module
    /// global, 0 for a local.
    fn parse_variable(&mut self, error_message: &str) -> u8 {
        self.consume(TokenKind::Identifier, error_message);

        if self.frame().scope_depth == 0 {
            return self.identifier_constant(self.previous);
        }

        let name = self.previous;
        self.declare_variable(name);
        0
    }

    fn define_variable(&mut self, global: u8, constant: bool) {
        if self.frame().scope_depth == 0 {
            if constant {
                if let Some(Value::String(id)) = self
                    .current_chunk()
                    .constants
                    .get(global as usize)
                    .copied()
                {
                    self.vm.constants.insert(id, Value::Nil);
                }
            }
            self.emit_op(OpCode::DefineModule);
            self.emit_byte(global);
        } else {
            // Mark the local as defined now.
            let depth = self.frame().scope_depth;
            if let Some(local) = self.frame_mut().locals.last_mut() {
                local.depth = depth;
                local.constant = constant;
            }
        }
    }

    fn check_const(&mut self, set_op: OpCode, arg: u8) {
        let violation = match set_op {
            OpCode::SetLocal => self.frame().locals[arg as usize].constant,
            OpCode::SetUpvalue => self.frame().upvalues[arg as usize].constant,
            OpCode::SetModule => {
                match self.current_chunk().constants.get(arg as usize).copied() {
                    Some(Value::String(id)) => self.vm.constants.contains_key(&id),
                    _ => false,
                }
            }
            _ => false,
        };
        if violation {
            self.error("Cannot assign to a constant.");
        }
    }

    // ---- Pratt expression parser ----

    fn rule(kind: TokenKind) -> ParseRule<'src, 'vm> {
        use TokenKind::*;

        let (prefix, infix, precedence): (
            Option<PrefixFn<'src, 'vm>>,
            Option<InfixFn<'src, 'vm>>,
            Precedence,
        ) = match kind {
            LeftParen => (Some(Self::grouping), Some(Self::call), Precedence::Call),
            Dot => (None, Some(Self::dot), Precedence::Call),
            Minus => (Some(Self::unary), Some(Self::binary), Precedence::Term),
            Plus => (None, Some(Self::binary), Precedence::Term),
            Slash | Star | Percent => (None, Some(Self::binary), Precedence::Factor),
            StarStar => (None, Some(Self::binary), Precedence::Indices),
            Ampersand | Caret | Pipe => (None, Some(Self::binary), Precedence::Bitwise),
            Not => (Some(Self::unary), None, Precedence::None),
            BangEqual | EqualEqual => (None, Some(Self::binary), Precedence::Equality),
            Greater | GreaterEqual | Less | LessEqual => {
                (None, Some(Self::binary), Precedence::Comparison)
            }
            Identifier => (Some(Self::variable), None, Precedence::None),
            String => (Some(Self::string), None, Precedence::None),
            R => (Some(Self::r_string), None, Precedence::None),
            Number => (Some(Self::number), None, Precedence::None),
            And => (None, Some(Self::and_), Precedence::And),
            Or => (None, Some(Self::or_), Precedence::Or),
            False | Nil | True => (Some(Self::literal), None, Precedence::None),
            Super => (Some(Self::super_), None, Precedence::None),
            This => (Some(Self::this_), None, Precedence::None),
            _ => (None, None, Precedence::None),
        };

        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let prefix = match Self::rule(self.previous.kind).prefix {
            Some(rule) => rule,
            None => {
                self.error("Expect expression.");
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= Self::rule(self.current.kind).precedence {
            let token = self.previous;
            self.advance();
            if let Some(infix) = Self::rule(self.previous.kind).infix {
                infix(self, token, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            // The `=` was refused by everything that could have consumed
            // it, so the left side is not a valid assignment target.
            self.error("Invalid assignment target.");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    // ---- Peephole folding ----

    /// Fold `CONSTANT a, CONSTANT b` followed by an arithmetic operator into
    /// a single pooled constant. Returns true when the fold happened.
    fn fold_binary(&mut self, operator: TokenKind) -> bool {
        let chunk = self.current_chunk();
        let n = chunk.code.len();
        if n < 4 {
            return false;
        }
        if chunk.code[n - 2] != OpCode::Constant as u8 || chunk.code[n - 4] != OpCode::Constant as u8
        {
            return false;
        }

        let rhs_index = chunk.code[n - 1] as usize;
        let lhs_index = chunk.code[n - 3] as usize;
        if rhs_index + 1 != chunk.constants.len() {
            return false;
        }

        let lhs = match chunk.constants.get(lhs_index).and_then(|v| v.as_number()) {
            Some(v) => v,
            None => return false,
        };
        let rhs = match chunk.constants.get(rhs_index).and_then(|v| v.as_number()) {
            Some(v) => v,
            None => return false,
        };

        let folded = match operator {
            TokenKind::Plus => lhs + rhs,
            TokenKind::Minus => lhs - rhs,
            TokenKind::Star => lhs * rhs,
            TokenKind::Slash => lhs / rhs,
            _ => return false,
        };

        let chunk = self.current_chunk_mut();
        chunk.constants[lhs_index] = Value::Number(folded);
        chunk.constants.pop();
        chunk.truncate_code(2);
        true
    }

    /// Fold `not true`/`not false` and negation of a literal number.
    fn fold_unary(&mut self, operator: TokenKind) -> bool {
        let value_token = self.previous.kind;

        match operator {
            TokenKind::Not => {
                let n = self.current_chunk().len();
                if n == 0 {
                    return false;
                }
                if value_token == TokenKind::True
                    && self.current_chunk().code[n - 1] == OpCode::True as u8
                {
                    self.current_chunk_mut().code[n - 1] = OpCode::False as u8;
                    return true;
                }
                if value_token == TokenKind::False
                    && self.current_chunk().code[n - 1] == OpCode::False as u8
                {
                    self.current_chunk_mut().code[n - 1] = OpCode::True as u8;
                    return true;
                }
                false
            }
            TokenKind::Minus => {
                if value_token != TokenKind::Number {
                    return false;
                }
                let chunk = self.current_chunk();
                let n = chunk.code.len();
                if n < 2 || chunk.code[n - 2] != OpCode::Constant as u8 {
                    return false;
                }
                let index = chunk.code[n - 1] as usize;
                let value = match chunk.constants.get(index).and_then(|v| v.as_number()) {
                    Some(v) => v,
                    None => return false,
                };
                self.current_chunk_mut().constants[index] = Value::Number(-value);
                true
            }
            _ => false,
        }
    }

    // ---- Expression rules ----

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        // Strip digit-separator underscores before parsing.
        let stripped: std::string::String =
            self.previous.lexeme.chars().filter(|&c| c != '_').collect();
        let value = match stripped.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                self.error("Invalid number literal.");
                0.0
            }
        };
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let processed = process_escapes(self.previous.lexeme);
        let id = self.vm.intern(&processed);
        self.emit_constant(Value::String(id));
    }

    /// Raw string: the `r` prefix was the previous token; the string itself
    /// follows and is taken verbatim, quotes stripped.
    fn r_string(&mut self, _can_assign: bool) {
        if self.match_token(TokenKind::String) {
            let lexeme = self.previous.lexeme.as_bytes();
            let id = self.vm.intern(&lexeme[1..lexeme.len() - 1]);
            self.emit_constant(Value::String(id));
            return;
        }

        self.consume(TokenKind::String, "Expected string after r delimiter");
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => {}
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);

        if self.fold_unary(operator) {
            return;
        }

        match operator {
            TokenKind::Not => self.emit_op(OpCode::Not),
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            _ => {}
        }
    }

    fn binary(&mut self, previous_token: Token<'src>, _can_assign: bool) {
        let operator = self.previous.kind;

        let precedence = Self::rule(operator).precedence.next();
        self.parse_precedence(precedence);

        // Attempt a constant fold when both operands were literal numbers.
        if previous_token.kind == TokenKind::Number
            && self.previous.kind == TokenKind::Number
            && self.fold_binary(operator)
        {
            return;
        }

        match operator {
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::Percent => self.emit_op(OpCode::Mod),
            TokenKind::StarStar => self.emit_op(OpCode::Pow),
            TokenKind::Ampersand => self.emit_op(OpCode::BitwiseAnd),
            TokenKind::Caret => self.emit_op(OpCode::BitwiseXor),
            TokenKind::Pipe => self.emit_op(OpCode::BitwiseOr),
            _ => {}
        }
    }

    fn and_(&mut self, _previous_token: Token<'src>, _can_assign: bool) {
        // Short circuit: if the left operand is false, skip the right.
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);

        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _previous_token: Token<'src>, _can_assign: bool) {
        // If the left operand is true, keep it and skip the right.
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn argument_list(&mut self, unpack: &mut bool) -> u8 {
        let mut arg_count: u16 = 0;

        if !self.check(TokenKind::RightParen) {
            loop {
                if *unpack {
                    self.error_at_current("Value unpacking must be the last argument.");
                }
                if self.match_token(TokenKind::DotDotDot) {
                    *unpack = true;
                }

                self.expression();
                arg_count += 1;

                if arg_count > 255 {
                    self.error("Cannot have more than 255 arguments.");
                }

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        arg_count.min(255) as u8
    }

    fn call(&mut self, _previous_token: Token<'src>, _can_assign: bool) {
        let mut unpack = false;
        let arg_count = self.argument_list(&mut unpack);

        self.emit_op(OpCode::Call);
        self.emit_bytes(arg_count, u8::from(unpack));
    }

    /// Try to consume a compound assignment operator, returning the
    /// arithmetic opcode it maps to.
    fn match_compound_assign(&mut self) -> Option<OpCode> {
        let op = match self.current.kind {
            TokenKind::PlusEquals => OpCode::Add,
            TokenKind::MinusEquals => OpCode::Subtract,
            TokenKind::MultiplyEquals => OpCode::Multiply,
            TokenKind::DivideEquals => OpCode::Divide,
            TokenKind::AmpersandEquals => OpCode::BitwiseAnd,
            TokenKind::CaretEquals => OpCode::BitwiseXor,
            TokenKind::PipeEquals => OpCode::BitwiseOr,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn dot(&mut self, _previous_token: Token<'src>, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.identifier_constant(self.previous);

        if self.match_token(TokenKind::LeftParen) {
            let mut unpack = false;
            let arg_count = self.argument_list(&mut unpack);
            self.emit_op(OpCode::Invoke);
            self.emit_byte(arg_count);
            self.emit_bytes(name, u8::from(unpack));
            return;
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op(OpCode::SetProperty);
            self.emit_byte(name);
            return;
        }

        let compound = if can_assign {
            self.match_compound_assign()
        } else {
            None
        };
        if let Some(op) = compound {
            self.emit_op(OpCode::GetPropertyNoPop);
            self.emit_byte(name);
            self.expression();
            self.emit_op(op);
            self.emit_op(OpCode::SetProperty);
            self.emit_byte(name);
        } else {
            self.emit_op(OpCode::GetProperty);
            self.emit_byte(name);
        }
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let top = self.frames.len() - 1;
        let get_op;
        let set_op;
        let arg;
        let mut can_assign = can_assign;

        if let Some(slot) = self.resolve_local(top, &name, false) {
            get_op = OpCode::GetLocal;
            set_op = OpCode::SetLocal;
            arg = slot;
        } else if let Some(index) = self.resolve_upvalue(top, &name) {
            get_op = OpCode::GetUpvalue;
            set_op = OpCode::SetUpvalue;
            arg = index;
        } else {
            arg = self.identifier_constant(name);
            let id = self.vm.intern(name.lexeme.as_bytes());
            if self.vm.globals.contains_key(&id) {
                // Vm built-ins are read-only.
                get_op = OpCode::GetGlobal;
                set_op = OpCode::SetModule;
                can_assign = false;
            } else {
                get_op = OpCode::GetModule;
                set_op = OpCode::SetModule;
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.check_const(set_op, arg);
            self.expression();
            self.emit_op(set_op);
            self.emit_byte(arg);
            return;
        }

        let compound = if can_assign {
            self.match_compound_assign()
        } else {
            None
        };
        if let Some(op) = compound {
            self.check_const(set_op, arg);
            self.named_variable(name, false);
            self.expression();
            self.emit_op(op);
            self.emit_op(set_op);
            self.emit_byte(arg);
        } else {
            self.emit_op(get_op);
            self.emit_byte(arg);
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous;
        self.named_variable(name, can_assign);
    }

    fn push_superclass(&mut self) {
        if self.classes.is_empty() {
            return;
        }
        self.named_variable(Token::synthetic("super"), false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Cannot utilise 'super' outside of a class.");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("Cannot utilise 'super' in a class with no superclass.");
        }

        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let name = self.identifier_constant(self.previous);

        // Push the receiver.
        self.named_variable(Token::synthetic("this"), false);

        if self.match_token(TokenKind::LeftParen) {
            let mut unpack = false;
            let arg_count = self.argument_list(&mut unpack);

            self.push_superclass();
            self.emit_op(OpCode::Super);
            self.emit_byte(arg_count);
            self.emit_bytes(name, u8::from(unpack));
        } else {
            self.push_superclass();
            self.emit_op(OpCode::GetSuper);
            self.emit_byte(name);
        }
    }

    fn this_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Cannot utilise 'this' outside of a class.");
        } else {
            self.variable(false);
        }
    }

    // ---- Functions ----

    /// Create a frame for a new function and compile its parameter list.
    fn begin_function(&mut self, kind: FunctionKind, access: AccessLevel) {
        self.begin_frame(kind, access);
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");

        if !self.check(TokenKind::RightParen) {
            let mut optional = false;
            let mut spread = false;
            let mut required: u16 = 0;
            let mut optional_count: u16 = 0;
            let mut index: u8 = 0;

            loop {
                if spread {
                    self.error("spread parameter must be last in the parameter list");
                }

                let var_keyword = self.match_token(TokenKind::Var);
                spread = self.match_token(TokenKind::DotDotDot);
                self.consume(TokenKind::Identifier, "Expect parameter name.");
                let param_constant = self.identifier_constant(self.previous);
                let name = self.previous;
                self.declare_variable(name);
                self.define_variable(param_constant, false);

                if kind == FunctionKind::Initializer && var_keyword {
                    let function = self.frame().function;
                    let function = self.vm.function_mut(function);
                    function.property_constants.push(param_constant);
                    function.property_indexes.push(index);
                    function.property_count = function.property_count.saturating_add(1);
                } else if var_keyword {
                    self.error("var keyword in a function definition that is not a class constructor");
                }

                if spread {
                    if kind == FunctionKind::Initializer {
                        self.error("spread parameter cannot be used in a class constructor");
                    }
                    let function = self.frame().function;
                    self.vm.function_mut(function).is_variadic = true;
                }

                if self.match_token(TokenKind::Equal) {
                    if spread {
                        self.error("spread parameter cannot have an optional value");
                    }
                    optional_count += 1;
                    optional = true;
                    // The default value runs in the function prologue.
                    self.expression();
                } else {
                    required += 1;
                    if optional {
                        self.error("Cannot have non-optional parameter after optional.");
                    }
                }

                if required + optional_count > 255 {
                    self.error("Cannot have more than 255 parameters.");
                }
                index = index.saturating_add(1);

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }

            let function = self.frame().function;
            let function = self.vm.function_mut(function);
            function.arity = required.min(255) as u8;
            function.arity_optional = optional_count.min(255) as u8;

            if optional_count > 0 {
                self.emit_op(OpCode::DefineOptional);
                self.emit_bytes(required.min(255) as u8, optional_count.min(255) as u8);
            }
        }

        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
    }

    fn function(&mut self, kind: FunctionKind, access: AccessLevel) {
        self.begin_function(kind, access);

        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        // end_frame pops the scope's locals implicitly with the frame.
        self.end_frame();
    }

    // ---- Statements ----

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
            if self.panic_mode {
                self.synchronize();
            }
            return;
        }

        if self.match_token(TokenKind::Def) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration(false);
        } else if self.match_token(TokenKind::Const) {
            self.var_declaration(true);
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::Import) {
            self.import_statement();
        } else if self.match_token(TokenKind::From) {
            self.from_import_statement();
        } else if self.match_token(TokenKind::Break) {
            self.break_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else if self.match_token(TokenKind::Continue) {
            self.continue_statement();
        } else {
            self.expression_statement();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.function(FunctionKind::Function, AccessLevel::Public);
        self.define_variable(global, false);
    }

    fn var_declaration(&mut self, constant: bool) {
        loop {
            let global = self.parse_variable("Expect variable name.");

            if self.match_token(TokenKind::Equal) {
                // Compile the initializer.
                self.expression();
            } else {
                if constant {
                    self.error("Constants must be initialised.");
                }
                // Default to nil.
                self.emit_op(OpCode::Nil);
            }

            self.define_variable(global, constant);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let name_constant = self.identifier_constant(self.previous);
        let class_name = self.previous;

        self.declare_variable(class_name);

        self.classes.push(ClassRecord {
            name: class_name,
            has_superclass: false,
        });

        if self.match_token(TokenKind::Less) {
            self.expression();
            self.classes.last_mut().unwrap().has_superclass = true;

            self.begin_scope();

            // The superclass value on the stack becomes a local named
            // "super" so methods can capture it.
            self.add_local(Token::synthetic("super"));

            self.emit_op(OpCode::Subclass);
        } else {
            self.emit_op(OpCode::Class);
        }
        self.emit_byte(name_constant);

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        self.parse_class_body();
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");

        if self.classes.last().unwrap().has_superclass {
            self.end_scope();
            self.emit_op(OpCode::EndClass);
        }

        self.classes.pop();
        self.define_variable(name_constant, false);
    }

    fn parse_class_body(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if self.match_token(TokenKind::Var) {
                self.consume(TokenKind::Identifier, "Expect class variable name.");
                let name = self.identifier_constant(self.previous);
                self.consume(TokenKind::Equal, "Expect '=' after class variable identifier.");
                self.expression();
                self.emit_op(OpCode::SetClassVar);
                self.emit_byte(name);

                self.consume(
                    TokenKind::Semicolon,
                    "Expect ';' after class variable declaration.",
                );
            } else {
                self.method();
            }
        }
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let constant = self.identifier_constant(self.previous);

        // A method named "init" is the initializer.
        let kind = if self.previous.lexeme == "init" {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };

        self.function(kind, AccessLevel::Public);

        self.emit_op(OpCode::Method);
        self.emit_byte(constant);
    }

    fn expression_statement(&mut self) {
        // Peek one token past the start of the expression so the REPL can
        // tell assignments from expressions, then rewind the scanner.
        let previous = self.previous;
        self.advance();
        let after = self.current.kind;
        for _ in 0..self.current.lexeme.len() {
            self.scanner.back_track();
        }
        self.current = self.previous;
        self.previous = previous;

        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");

        if self.vm.repl
            && after != TokenKind::Equal
            && self.frame().kind == FunctionKind::TopLevel
        {
            self.emit_op(OpCode::PopRepl);
        } else {
            self.emit_op(OpCode::Pop);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        // Jump to the else branch if the condition is false.
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);

        // Compile the then branch, discarding the condition first.
        self.emit_op(OpCode::Pop);
        self.statement();

        // Jump over the else branch when the then branch ran.
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }

        self.patch_jump(end_jump);
    }

    fn return_statement(&mut self) {
        if self.frame().kind == FunctionKind::TopLevel {
            self.error("Cannot return from top-level code.");
        }

        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.frame().kind == FunctionKind::Initializer {
                self.error("Cannot return a value from an initializer.");
            }

            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");

            self.emit_op(OpCode::Return);
        }
    }

    // ---- Loops ----

    fn while_statement(&mut self) {
        let start = self.current_chunk().len();
        let scope_depth = self.frame().scope_depth;
        self.frame_mut().loops.push(LoopRecord {
            start,
            body: 0,
            end: None,
            scope_depth,
        });

        // `while {` is an infinite loop; otherwise the condition is
        // parenthesized.
        if self.check(TokenKind::LeftBrace) {
            self.emit_op(OpCode::True);
        } else {
            self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
            self.expression();
            self.consume(TokenKind::RightParen, "Expect ')' after condition.");
        }

        let end = self.emit_jump(OpCode::JumpIfFalse);
        self.frame_mut().loops.last_mut().unwrap().end = Some(end);

        self.emit_op(OpCode::Pop);
        let body = self.current_chunk().len();
        self.frame_mut().loops.last_mut().unwrap().body = body;
        self.statement();

        self.emit_loop(start);
        self.end_loop();
    }

    fn for_statement(&mut self) {
        // Scope for the loop variable.
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Var) {
            self.var_declaration(false);
        } else if self.match_token(TokenKind::Semicolon) {
            // No initializer.
        } else {
            self.expression_statement();
        }

        let start = self.current_chunk().len();
        let scope_depth = self.frame().scope_depth;
        self.frame_mut().loops.push(LoopRecord {
            start,
            body: 0,
            end: None,
            scope_depth,
        });

        // The exit condition.
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");

            let end = self.emit_jump(OpCode::JumpIfFalse);
            self.frame_mut().loops.last_mut().unwrap().end = Some(end);
            self.emit_op(OpCode::Pop);
        }

        // The increment runs after the body, so jump over it on the way in.
        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);

            let increment_start = self.current_chunk().len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            let loop_start = self.frame().loops.last().unwrap().start;
            self.emit_loop(loop_start);
            // `continue` now targets the increment.
            self.frame_mut().loops.last_mut().unwrap().start = increment_start;

            self.patch_jump(body_jump);
        }

        let body = self.current_chunk().len();
        self.frame_mut().loops.last_mut().unwrap().body = body;
        self.statement();

        let loop_start = self.frame().loops.last().unwrap().start;
        self.emit_loop(loop_start);

        self.end_loop();
        self.end_scope();
    }

    /// Emit stack cleanup for every local deeper than the innermost loop.
    fn emit_loop_cleanup(&mut self) {
        let scope_depth = match self.frame().innermost_loop() {
            Some(record) => record.scope_depth,
            None => return,
        };
        let cleanup: Vec<bool> = self
            .frame()
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth > scope_depth)
            .map(|local| local.is_upvalue)
            .collect();
        for is_upvalue in cleanup {
            if is_upvalue {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
        }
    }

    fn break_statement(&mut self) {
        if self.frame().loops.is_empty() {
            self.error("Cannot utilise 'break' outside of a loop.");
            return;
        }

        self.consume(TokenKind::Semicolon, "Expected semicolon after break");

        self.emit_loop_cleanup();
        // A placeholder the loop's exit pass rewrites into a real jump.
        self.emit_jump(OpCode::Break);
    }

    fn continue_statement(&mut self) {
        if self.frame().loops.is_empty() {
            self.error("Cannot utilise 'continue' outside of a loop.");
            return;
        }

        self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.");

        self.emit_loop_cleanup();

        // Jump to the top of the innermost loop.
        let start = self.frame().innermost_loop().unwrap().start;
        self.emit_loop(start);
    }

    /// Close the innermost loop: patch its exit jump and rewrite every
    /// `BREAK` placeholder in the body into a forward jump to this point.
    fn end_loop(&mut self) {
        let record = self.frame_mut().loops.pop().unwrap();

        if let Some(end) = record.end {
            self.patch_jump(end);
            self.emit_op(OpCode::Pop); // Condition.
        }

        let mut i = record.body;
        while i < self.current_chunk().len() {
            if self.current_chunk().code[i] == OpCode::Break as u8 {
                self.current_chunk_mut().code[i] = OpCode::Jump as u8;
                self.patch_jump(i + 1);
                i += 3;
            } else {
                i += 1 + self.operand_count_at(i);
            }
        }
    }

    /// Operand byte count of the instruction at `ip` in the current chunk.
    fn operand_count_at(&self, ip: usize) -> usize {
        let chunk = self.current_chunk();
        let op = match OpCode::from_byte(chunk.code[ip]) {
            Some(op) => op,
            None => return 0,
        };
        if let Some(count) = op.fixed_operands() {
            return count;
        }
        match op {
            OpCode::Closure => {
                // One byte for the constant, then two per upvalue.
                let constant = chunk.code[ip + 1] as usize;
                match chunk.constants.get(constant).copied() {
                    Some(Value::Function(f)) => {
                        1 + 2 * self.vm.function(f).upvalue_count as usize
                    }
                    _ => 1,
                }
            }
            OpCode::ImportFrom => 1 + chunk.code[ip + 1] as usize,
            _ => 0,
        }
    }

    // ---- Imports ----

    fn import_statement(&mut self) {
        if self.match_token(TokenKind::String) {
            let lexeme = self.previous.lexeme.as_bytes();
            let id = self.vm.intern(&lexeme[1..lexeme.len() - 1]);
            let constant = self.make_constant(Value::String(id));

            self.emit_op(OpCode::Import);
            self.emit_byte(constant);
            self.emit_op(OpCode::Pop);

            if self.match_token(TokenKind::As) {
                let import_name = self.parse_variable("Expect import alias.");
                self.emit_op(OpCode::ImportVariable);
                self.define_variable(import_name, false);
            }
        } else {
            self.error_at_current("Expect import path string.");
        }

        self.emit_op(OpCode::ImportEnd);
        self.consume(TokenKind::Semicolon, "Expect ';' after import.");
    }

    fn from_import_statement(&mut self) {
        if self.match_token(TokenKind::String) {
            let lexeme = self.previous.lexeme.as_bytes();
            let id = self.vm.intern(&lexeme[1..lexeme.len() - 1]);
            let constant = self.make_constant(Value::String(id));

            self.consume(TokenKind::Import, "Expect 'import' after import path.");
            self.emit_op(OpCode::Import);
            self.emit_byte(constant);
            self.emit_op(OpCode::Pop);

            let mut variables: Vec<u8> = Vec::new();
            let mut names: Vec<Token<'src>> = Vec::new();

            loop {
                self.consume(TokenKind::Identifier, "Expect variable name.");
                names.push(self.previous);
                let constant = self.identifier_constant(self.previous);
                variables.push(constant);

                if variables.len() > 255 {
                    self.error("Cannot have more than 255 variables.");
                }

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }

            self.emit_op(OpCode::ImportFrom);
            self.emit_byte(variables.len().min(255) as u8);
            for &variable in &variables {
                self.emit_byte(variable);
            }

            // Globals define in reverse so the values pop in declaration
            // order; locals declare forward.
            if self.frame().scope_depth == 0 {
                for &variable in variables.iter().rev() {
                    self.define_variable(variable, false);
                }
            } else {
                for name in names {
                    self.declare_variable(name);
                    self.define_variable(0, false);
                }
            }
        } else {
            self.error_at_current("Expect import path string.");
        }

        self.emit_op(OpCode::ImportEnd);
        self.consume(TokenKind::Semicolon, "Expect ';' after import.");
    }

    // ---- Error recovery ----

    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }

            match self.current.kind {
                TokenKind::Class
                | TokenKind::Def
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Break
                | TokenKind::Return
                | TokenKind::Import => return,
                _ => {}
            }

            self.advance();
        }
    }
}

/// Strip the quotes from a string lexeme and process escape sequences.
/// Unknown escapes keep their backslash.
fn process_escapes(lexeme: &str) -> Vec<u8> {
    let bytes = lexeme.as_bytes();
    let inner = &bytes[1..bytes.len() - 1];
    let mut out = Vec::with_capacity(inner.len());

    let mut i = 0;
    while i < inner.len() {
        let byte = inner[i];
        if byte == b'\\' && i + 1 < inner.len() {
            let escaped = match inner[i + 1] {
                b'n' => Some(b'\n'),
                b't' => Some(b'\t'),
                b'r' => Some(b'\r'),
                b'v' => Some(0x0b),
                b'\\' => Some(b'\\'),
                b'\'' => Some(b'\''),
                b'"' => Some(b'"'),
                _ => None,
            };
            if let Some(b) = escaped {
                out.push(b);
                i += 2;
                continue;
            }
        }
        out.push(byte);
        i += 1;
    }

    out
}
