//! Basic blocks: a label, an ordered instruction list terminated by a control
//! instruction, and CFG neighbor links.
//!
//! Blend65 functions are small (spec.md §5 validates the SSA pipeline up to
//! ~200 blocks), so predecessor/successor sets are plain deduplicated `Vec`s
//! rather than `cranelift-bforest`'s balanced-tree sets — see DESIGN.md for
//! the tradeoff.

use crate::instructions::Instruction;

/// A basic block id: its position in the function's block arena.
pub type BlockId = u32;

/// A basic block.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label_name: String,
    pub instructions: Vec<Instruction>,
    predecessors: Vec<BlockId>,
    successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId, label_name: impl Into<String>) -> Self {
        BasicBlock {
            id,
            label_name: label_name.into(),
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// The terminator instruction, if one has been appended yet.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Push an instruction. Panics (IL invariant violation, spec.md §7) if a
    /// terminator has already been placed, or if a non-terminator is pushed
    /// after one.
    pub fn push(&mut self, inst: Instruction) {
        assert!(
            self.terminator().is_none(),
            "block {} already has a terminator; cannot append {}",
            self.id,
            inst.mnemonic()
        );
        self.instructions.push(inst);
    }

    /// Insert a phi instruction after any existing phis but before the
    /// block's ordinary instructions (used by SSA construction, §4.3-4.4).
    pub fn insert_phi(&mut self, inst: Instruction) {
        debug_assert!(inst.is_phi());
        let pos = self.instructions.iter().take_while(|i| i.is_phi()).count();
        self.instructions.insert(pos, inst);
    }

    /// Every phi in this block, in insertion order.
    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().take_while(|i| i.is_phi())
    }

    /// Non-phi instructions, in order, including the terminator.
    pub fn body(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().skip_while(|i| i.is_phi())
    }
}

/// Link `from -> to`: inserts `to` into `from`'s successors and `from` into
/// `to`'s predecessors. Both insertions are deduplicated.
pub fn link(blocks: &mut [BasicBlock], from: BlockId, to: BlockId) {
    let from_idx = from as usize;
    let to_idx = to as usize;
    if !blocks[from_idx].successors.contains(&to) {
        blocks[from_idx].successors.push(to);
    }
    if !blocks[to_idx].predecessors.contains(&from) {
        blocks[to_idx].predecessors.push(from);
    }
}
