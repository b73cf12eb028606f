//! IL functions: a CFG of basic blocks, parameters, locals, and the value
//! factory that owns all register/label/instruction ids for the function.

use crate::ir::block::{link, BasicBlock, BlockId};
use crate::types::Type;
use crate::value::{Register, ValueFactory};
use rustc_hash::FxHashMap;

/// Where a global or local variable is physically placed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StorageClass {
    /// Zero-page RAM: fast single-byte-address access.
    ZeroPage,
    /// General RAM, uninitialized.
    Ram,
    /// Initialized read-only/RW data section.
    Data,
    /// A fixed address given at the declaration site (memory-mapped I/O).
    Map(u16),
}

/// A local variable known to a function (distinct from its SSA register
/// once the SSA pass runs): name, declared type, and storage class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVar {
    pub ty: Type,
    pub storage: StorageClass,
}

/// A function parameter: name, type, and its pre-allocated register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub register: Register,
}

/// A single-entry, multi-exit control-flow-graph function.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub blocks: Vec<BasicBlock>,
    pub locals: FxHashMap<String, LocalVar>,
    pub values: ValueFactory,
}

/// The block id of the entry block; always 0 (spec.md §3.4).
pub const ENTRY_BLOCK: BlockId = 0;

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        let mut values = ValueFactory::new();
        let entry_label = values.make_block_label("entry");
        let entry = BasicBlock::new(entry_label.block_id, entry_label.name.clone());
        Function {
            name: name.into(),
            params: Vec::new(),
            return_type,
            blocks: vec![entry],
            locals: FxHashMap::default(),
            values,
        }
    }

    /// Declare a parameter, allocating its register.
    pub fn add_parameter(&mut self, name: impl Into<String>, ty: Type) -> Register {
        let register = self.values.make_register(ty.clone());
        self.params.push(Parameter {
            name: name.into(),
            ty,
            register: register.clone(),
        });
        register
    }

    /// Declare a local variable.
    pub fn declare_local(&mut self, name: impl Into<String>, ty: Type, storage: StorageClass) {
        self.locals.insert(name.into(), LocalVar { ty, storage });
    }

    /// Append a new, empty basic block and return its id.
    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let label = self.values.make_block_label(name);
        self.blocks.push(BasicBlock::new(label.block_id, label.name));
        label.block_id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id as usize]
    }

    pub fn entry_block(&self) -> BlockId {
        ENTRY_BLOCK
    }

    /// Link `from -> to` in the CFG.
    pub fn link(&mut self, from: BlockId, to: BlockId) {
        link(&mut self.blocks, from, to);
    }

    /// Blocks in ascending id order (spec.md §5: deterministic enumeration).
    pub fn blocks_in_order(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    /// Check the IL invariants from spec.md §3.3/§3.4: every block has
    /// exactly one terminator and it is last; every result register id is
    /// produced by at most one instruction.
    pub fn verify(&self) -> Result<(), String> {
        let mut defined: FxHashMap<u32, u32> = FxHashMap::default();
        for block in &self.blocks {
            let mut terminator_seen = false;
            for (idx, inst) in block.instructions.iter().enumerate() {
                if terminator_seen {
                    return Err(format!(
                        "block {} has an instruction after its terminator",
                        block.id
                    ));
                }
                if inst.is_terminator() {
                    if idx != block.instructions.len() - 1 {
                        return Err(format!(
                            "block {} terminator {} is not the last instruction",
                            block.id, inst.id
                        ));
                    }
                    terminator_seen = true;
                }
                if let Some(result) = &inst.result {
                    if let Some(prior) = defined.insert(result.id.0, inst.id.0) {
                        return Err(format!(
                            "register v{} redefined by instruction {} (first defined by {})",
                            result.id.0, inst.id, prior
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
