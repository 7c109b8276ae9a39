//! Bytecode opcodes.
//!
//! A chunk is a flat byte array of variable-length instructions; each
//! instruction starts with one opcode byte followed by its operands. The
//! numeric values are a stable ABI with the execution engine.

/// All Cinder opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // --- Constants and literals ---
    Constant = 0,
    Nil,
    True,
    False,

    // --- Stack management ---
    Pop,
    PopRepl,

    // --- Variables ---
    GetLocal,
    SetLocal,
    GetGlobal,
    GetModule,
    SetModule,
    DefineModule,
    GetUpvalue,
    SetUpvalue,

    // --- Properties and classes ---
    GetProperty,
    GetPropertyNoPop,
    SetProperty,
    SetClassVar,
    GetSuper,

    // --- Operators ---
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Pow,
    Not,
    Negate,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,

    // --- Control flow ---
    Jump,
    JumpIfFalse,
    Loop,
    Break,

    // --- Calls and closures ---
    Call,
    Invoke,
    Super,
    Closure,
    CloseUpvalue,
    Return,
    DefineOptional,

    // --- Classes ---
    Class,
    Subclass,
    EndClass,
    Method,

    // --- Imports ---
    Import,
    ImportVariable,
    ImportFrom,
    ImportEnd,

    // --- Reserved by the execution engine; never emitted ---
    Empty,
}

impl OpCode {
    /// Number of opcodes.
    pub const COUNT: usize = OpCode::Empty as usize + 1;

    /// Get the opcode from its byte value.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        if (byte as usize) < Self::COUNT {
            // Safety: OpCode is repr(u8), dense from 0, and in range.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }

    /// Get the name of this opcode.
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Constant => "CONSTANT",
            Nil => "NIL",
            True => "TRUE",
            False => "FALSE",
            Pop => "POP",
            PopRepl => "POP_REPL",
            GetLocal => "GET_LOCAL",
            SetLocal => "SET_LOCAL",
            GetGlobal => "GET_GLOBAL",
            GetModule => "GET_MODULE",
            SetModule => "SET_MODULE",
            DefineModule => "DEFINE_MODULE",
            GetUpvalue => "GET_UPVALUE",
            SetUpvalue => "SET_UPVALUE",
            GetProperty => "GET_PROPERTY",
            GetPropertyNoPop => "GET_PROPERTY_NO_POP",
            SetProperty => "SET_PROPERTY",
            SetClassVar => "SET_CLASS_VAR",
            GetSuper => "GET_SUPER",
            Equal => "EQUAL",
            Greater => "GREATER",
            Less => "LESS",
            Add => "ADD",
            Subtract => "SUBTRACT",
            Multiply => "MULTIPLY",
            Divide => "DIVIDE",
            Mod => "MOD",
            Pow => "POW",
            Not => "NOT",
            Negate => "NEGATE",
            BitwiseAnd => "BITWISE_AND",
            BitwiseXor => "BITWISE_XOR",
            BitwiseOr => "BITWISE_OR",
            Jump => "JUMP",
            JumpIfFalse => "JUMP_IF_FALSE",
            Loop => "LOOP",
            Break => "BREAK",
            Call => "CALL",
            Invoke => "INVOKE",
            Super => "SUPER",
            Closure => "CLOSURE",
            CloseUpvalue => "CLOSE_UPVALUE",
            Return => "RETURN",
            DefineOptional => "DEFINE_OPTIONAL",
            Class => "CLASS",
            Subclass => "SUBCLASS",
            EndClass => "END_CLASS",
            Method => "METHOD",
            Import => "IMPORT",
            ImportVariable => "IMPORT_VARIABLE",
            ImportFrom => "IMPORT_FROM",
            ImportEnd => "IMPORT_END",
            Empty => "EMPTY",
        }
    }

    /// Fixed operand byte count, or `None` for instructions whose length
    /// depends on their operands (`Closure`, `ImportFrom`).
    pub fn fixed_operands(&self) -> Option<usize> {
        use OpCode::*;
        match self {
            Nil | True | False | Pop | PopRepl | Equal | Greater | Less | Add | Subtract
            | Multiply | Divide | Mod | Pow | Not | Negate | BitwiseAnd | BitwiseXor
            | BitwiseOr | CloseUpvalue | Return | EndClass | ImportVariable | ImportEnd
            | Break | Empty => Some(0),

            Constant | GetLocal | SetLocal | GetGlobal | GetModule | SetModule
            | DefineModule | GetUpvalue | SetUpvalue | GetProperty | GetPropertyNoPop
            | SetProperty | SetClassVar | GetSuper | Method | Import | Class | Subclass => {
                Some(1)
            }

            Jump | JumpIfFalse | Loop | DefineOptional | Call => Some(2),

            Invoke | Super => Some(3),

            Closure | ImportFrom => None,
        }
    }
}
