//! Dominance frontier computation (spec.md §4.2).

use crate::ir::{BlockId, Function};
use crate::ssa::dominator_tree::DominatorTree;
use rustc_hash::FxHashMap;

/// `DF(b)` for every reachable block `b`.
pub struct DominanceFrontiers {
    frontiers: FxHashMap<BlockId, Vec<BlockId>>,
}

impl DominanceFrontiers {
    /// For each join block `y` (two or more predecessors), walk up the
    /// dominator tree from each predecessor `p`, inserting `y` into `DF`
    /// of every ancestor strictly above `idom(y)`.
    pub fn compute(func: &Function, domtree: &DominatorTree) -> Self {
        let mut frontiers: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for block in func.blocks_in_order() {
            let y = block.id;
            if !domtree.is_reachable(y) {
                continue;
            }
            let preds = block.predecessors();
            if preds.len() < 2 {
                continue;
            }
            let idom_y = domtree.idom(y);
            for &p in preds {
                if !domtree.is_reachable(p) {
                    continue;
                }
                let mut runner = p;
                loop {
                    let runner_is_idom_y = match idom_y {
                        Some(d) if d >= 0 => runner == d as BlockId,
                        _ => false,
                    };
                    if runner_is_idom_y {
                        break;
                    }
                    let entry = frontiers.entry(runner).or_default();
                    if !entry.contains(&y) {
                        entry.push(y);
                    }
                    match domtree.idom(runner) {
                        Some(d) if d >= 0 => runner = d as BlockId,
                        _ => break,
                    }
                }
            }
        }
        for v in frontiers.values_mut() {
            v.sort_unstable();
        }
        DominanceFrontiers { frontiers }
    }

    pub fn of(&self, block: BlockId) -> &[BlockId] {
        self.frontiers.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }
}
