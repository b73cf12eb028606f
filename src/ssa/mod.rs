//! SSA construction: dominator tree, dominance frontiers, iterated
//! dominance frontier phi placement, and renaming (spec.md §4.1-§4.4).

pub mod dominance_frontier;
pub mod dominator_tree;
pub mod phi_placement;
pub mod renaming;

pub use dominance_frontier::DominanceFrontiers;
pub use dominator_tree::DominatorTree;
pub use phi_placement::PhiPlacement;
pub use renaming::{rename, RenamingResult};

use crate::ir::function::Function;
use crate::ir::BlockId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Run the full SSA construction pipeline over `func`, promoting every
/// local variable in `promotable` (spec.md §4: dominator tree -> dominance
/// frontiers -> phi placement -> renaming). Variables not in `promotable`
/// are left as ordinary `LOAD_VAR`/`STORE_VAR` memory operations.
pub fn construct(func: &mut Function, promotable: &FxHashSet<String>) -> RenamingResult {
    let domtree = DominatorTree::compute(func);
    let frontiers = DominanceFrontiers::compute(func, &domtree);
    let def_sites = collect_def_sites(func, promotable);
    let placement = PhiPlacement::compute(&def_sites, &frontiers);
    rename(func, &domtree, &placement, promotable)
}

/// For each promotable variable, the set of blocks containing a direct
/// `STORE_VAR` write to it (spec.md §4.3, "Input: def sites").
fn collect_def_sites(
    func: &Function,
    promotable: &FxHashSet<String>,
) -> FxHashMap<String, FxHashSet<BlockId>> {
    let mut def_sites: FxHashMap<String, FxHashSet<BlockId>> = FxHashMap::default();
    for block in func.blocks_in_order() {
        for inst in &block.instructions {
            if let crate::instructions::Opcode::StoreVar { name, .. } = &inst.opcode {
                if promotable.contains(name) {
                    def_sites.entry(name.clone()).or_default().insert(block.id);
                }
            }
        }
    }
    def_sites
}
