//! The Vm handle: arenas, interner, and the global tables the compiler
//! consults.
//!
//! The execution engine proper lives elsewhere; this type is the narrow
//! collaborator surface the compiler needs. All heap objects live in arenas
//! owned here, so handles stay valid for the life of the Vm and a collection
//! can never invalidate an in-flight compile-time value.

use crate::object::{AccessLevel, FunctionId, FunctionKind, ModuleId, ObjFunction, ObjModule};
use crate::string::{StringId, StringInterner};
use crate::value::Value;
use indexmap::IndexMap;

pub struct Vm {
    /// All interned strings.
    pub strings: StringInterner,
    functions: Vec<ObjFunction>,
    modules: Vec<ObjModule>,
    /// Vm-provided built-in globals. Bindings here are read-only from
    /// script code.
    pub globals: IndexMap<StringId, Value>,
    /// Names of module globals declared `const`. Populated during compile,
    /// cleared after a non-REPL compile finishes.
    pub constants: IndexMap<StringId, Value>,
    /// Whether we are compiling for the interactive read-eval loop.
    pub repl: bool,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            strings: StringInterner::new(),
            functions: Vec::new(),
            modules: Vec::new(),
            globals: IndexMap::new(),
            constants: IndexMap::new(),
            repl: false,
        }
    }

    /// Create a Vm for interactive use: top-level expression results are
    /// kept for display instead of being discarded.
    pub fn new_repl() -> Self {
        let mut vm = Vm::new();
        vm.repl = true;
        vm
    }

    /// Intern a byte string. Idempotent.
    pub fn intern(&mut self, bytes: &[u8]) -> StringId {
        self.strings.intern(bytes)
    }

    /// Allocate a new empty function object.
    pub fn new_function(
        &mut self,
        module: ModuleId,
        kind: FunctionKind,
        access: AccessLevel,
    ) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(ObjFunction::new(module, kind, access));
        id
    }

    pub fn function(&self, id: FunctionId) -> &ObjFunction {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut ObjFunction {
        &mut self.functions[id.0 as usize]
    }

    /// Allocate a new module with the given name.
    pub fn new_module(&mut self, name: &str) -> ModuleId {
        let name = self.intern(name.as_bytes());
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(ObjModule { name, path: None });
        id
    }

    pub fn module(&self, id: ModuleId) -> &ObjModule {
        &self.modules[id.0 as usize]
    }

    /// Register a built-in global. Script code can read it through
    /// `GET_GLOBAL` but never assign to it.
    pub fn define_global(&mut self, name: &str, value: Value) {
        let name = self.intern(name.as_bytes());
        self.globals.insert(name, value);
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
