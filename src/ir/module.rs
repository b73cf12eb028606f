//! The IL module: an ordered list of functions, an ordered list of globals,
//! and an intrinsic registry.

use crate::ir::function::{Function, StorageClass};
use crate::types::Type;
use rustc_hash::FxHashMap;

/// A module-level global variable declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub storage: StorageClass,
    /// Present iff the declaration supplied an initializer. Required for
    /// `StorageClass::Data`.
    pub initial_value: Option<InitialValue>,
    /// Present only for `StorageClass::Map`, mirroring `storage`'s address.
    pub address: Option<u16>,
    pub is_constant: bool,
}

/// The initializer for a `Data`-class global.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialValue {
    Byte(u8),
    Word(u16),
    Array(Vec<InitialValue>),
}

/// An intrinsic function signature known to the code generator (e.g. a
/// library routine for `MUL`/`DIV` on targets lacking the hardware op).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntrinsicSignature {
    pub name: String,
    pub params: Vec<Type>,
    pub result: Type,
}

/// An IL module: the unit of compilation handed to codegen.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub source_name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    intrinsics: FxHashMap<String, IntrinsicSignature>,
}

impl Module {
    pub fn new(source_name: impl Into<String>) -> Self {
        Module {
            source_name: source_name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
            intrinsics: FxHashMap::default(),
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    pub fn register_intrinsic(&mut self, sig: IntrinsicSignature) {
        self.intrinsics.insert(sig.name.clone(), sig);
    }

    pub fn intrinsic(&self, name: &str) -> Option<&IntrinsicSignature> {
        self.intrinsics.get(name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn main_function(&self) -> Option<&Function> {
        self.find_function("main")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_declared_functions_by_name() {
        let mut m = Module::new("demo.b65");
        m.add_function(Function::new("main", Type::Void));
        assert!(m.main_function().is_some());
        assert!(m.find_function("nope").is_none());
    }
}
