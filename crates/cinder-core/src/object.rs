//! Function and module objects.

use crate::chunk::Chunk;
use crate::string::StringId;

/// An opaque handle to a function in the Vm's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FunctionId(pub u32);

/// An opaque handle to a module in the Vm's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ModuleId(pub u32);

/// What kind of function a chunk belongs to.
///
/// The kind drives the implicit-return shape (`init` returns `this`), the
/// legality of `return` (illegal at top level), and the name of local
/// slot zero.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FunctionKind {
    TopLevel,
    Function,
    Method,
    Initializer,
}

/// Method/function access level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessLevel {
    Public,
    Private,
}

/// A compiled function.
///
/// Mutated by the compiler while its frame is active; immutable once the
/// frame is closed.
#[derive(Clone, Debug)]
pub struct ObjFunction {
    /// Function name; `None` for the top level.
    pub name: Option<StringId>,
    /// Number of required parameters.
    pub arity: u8,
    /// Number of optional (defaulted) parameters.
    pub arity_optional: u8,
    /// Whether the last parameter is a spread parameter.
    pub is_variadic: bool,
    /// Number of upvalues captured by this function.
    pub upvalue_count: u16,
    /// Number of `var` parameters on an initializer.
    pub property_count: u8,
    /// Name-constant index for each `var` parameter, in declaration order.
    pub property_constants: Vec<u8>,
    /// Parameter position for each `var` parameter.
    pub property_indexes: Vec<u8>,
    /// The module this function was compiled in.
    pub module: ModuleId,
    pub kind: FunctionKind,
    pub access: AccessLevel,
    /// The function's bytecode.
    pub chunk: Chunk,
}

impl ObjFunction {
    pub fn new(module: ModuleId, kind: FunctionKind, access: AccessLevel) -> Self {
        ObjFunction {
            name: None,
            arity: 0,
            arity_optional: 0,
            is_variadic: false,
            upvalue_count: 0,
            property_count: 0,
            property_constants: Vec::new(),
            property_indexes: Vec::new(),
            module,
            kind,
            access,
            chunk: Chunk::new(),
        }
    }
}

/// A module: a named top-level compilation unit.
#[derive(Clone, Debug)]
pub struct ObjModule {
    pub name: StringId,
    /// Filesystem path the module was loaded from, when known.
    pub path: Option<StringId>,
}
