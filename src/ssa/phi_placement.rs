//! Iterated dominance frontier phi placement (spec.md §4.3).

use crate::ir::BlockId;
use crate::ssa::dominance_frontier::DominanceFrontiers;
use rustc_hash::{FxHashMap, FxHashSet};

/// Where phis are needed, plus the statistics spec.md §4.3 asks for.
pub struct PhiPlacement {
    /// variable name -> sorted set of blocks needing a phi for it.
    sites: FxHashMap<String, Vec<BlockId>>,
    pub variable_count: usize,
    pub blocks_with_phis: usize,
    pub total_phi_count: usize,
    pub max_phis_per_block: usize,
    pub iterations: usize,
}

impl PhiPlacement {
    /// `def_sites` maps each variable's base name to the set of blocks
    /// containing a direct write to it.
    pub fn compute(
        def_sites: &FxHashMap<String, FxHashSet<BlockId>>,
        frontiers: &DominanceFrontiers,
    ) -> Self {
        let mut sites: FxHashMap<String, Vec<BlockId>> = FxHashMap::default();
        let mut iterations = 0usize;

        // Deterministic order: iterate variables lexicographically.
        let mut var_names: Vec<&String> = def_sites.keys().collect();
        var_names.sort();

        for &var in &var_names {
            let defs = &def_sites[var];
            let mut has_phi: FxHashSet<BlockId> = FxHashSet::default();
            let mut worklist: Vec<BlockId> = defs.iter().copied().collect();
            worklist.sort_unstable();

            while let Some(b) = worklist.pop() {
                iterations += 1;
                for &y in frontiers.of(b) {
                    if has_phi.insert(y) {
                        sites.entry(var.clone()).or_default().push(y);
                        if !worklist.contains(&y) {
                            worklist.push(y);
                            worklist.sort_unstable();
                        }
                    }
                }
            }
            if let Some(v) = sites.get_mut(var) {
                v.sort_unstable();
                v.dedup();
            }
        }

        let blocks_with_phis: FxHashSet<BlockId> =
            sites.values().flatten().copied().collect();
        let total_phi_count: usize = sites.values().map(Vec::len).sum();
        let mut per_block: FxHashMap<BlockId, usize> = FxHashMap::default();
        for blocks in sites.values() {
            for &b in blocks {
                *per_block.entry(b).or_insert(0) += 1;
            }
        }
        let max_phis_per_block = per_block.values().copied().max().unwrap_or(0);

        PhiPlacement {
            sites,
            variable_count: def_sites.len(),
            blocks_with_phis: blocks_with_phis.len(),
            total_phi_count,
            max_phis_per_block,
            iterations,
        }
    }

    /// Blocks that need a phi for `variable`, sorted by id.
    pub fn sites_for(&self, variable: &str) -> &[BlockId] {
        self.sites.get(variable).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All variables that need a phi anywhere, sorted.
    pub fn variables(&self) -> Vec<&String> {
        let mut v: Vec<&String> = self.sites.keys().collect();
        v.sort();
        v
    }
}
