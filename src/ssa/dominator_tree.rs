//! Dominator tree construction via the iterative Cooper-Harvey-Kennedy
//! algorithm (spec.md §4.1).
//!
//! Grounded on `cranelift-codegen`'s
//! `dominator_tree/simple.rs`: reverse-postorder numbering followed by a
//! fixpoint over `idom` estimates, using "intersect by walking RPO numbers"
//! to merge predecessors. Cranelift's version works over instruction-level
//! `ProgramPoint`s; Blend65 only needs block-level dominance, so this is the
//! block-only specialization of the same algorithm.

use crate::ir::{BlockId, Function};
use rustc_hash::FxHashMap;

/// An immutable dominator tree for one function's reachable-from-entry
/// subgraph.
pub struct DominatorTree {
    /// Immediate dominator per block, or `-1` for the entry.
    idom: FxHashMap<BlockId, i64>,
    /// Reverse postorder number per reachable block (used internally by
    /// `compute` and exposed for debugging).
    rpo_number: FxHashMap<BlockId, u32>,
    /// Preorder of reachable blocks in the dominator tree.
    preorder: Vec<BlockId>,
    /// Postorder of reachable blocks in the dominator tree.
    postorder: Vec<BlockId>,
    depth: FxHashMap<BlockId, u32>,
    children: FxHashMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    /// Compute the dominator tree of `func`, starting from block 0.
    pub fn compute(func: &Function) -> Self {
        let entry = func.entry_block();
        let rpo = reverse_postorder(func, entry);
        let mut rpo_number = FxHashMap::default();
        for (i, &b) in rpo.iter().enumerate() {
            rpo_number.insert(b, i as u32);
        }

        let mut idom: FxHashMap<BlockId, i64> = FxHashMap::default();
        idom.insert(entry, -1);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter() {
                if b == entry {
                    continue;
                }
                let preds = func.block(b).predecessors();
                let mut new_idom: Option<BlockId> = None;
                for &p in preds {
                    if !idom.contains_key(&p) && p != entry {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(cur, p, &idom, &rpo_number),
                    });
                }
                if let Some(new_idom) = new_idom {
                    let prev = idom.get(&b).copied();
                    if prev != Some(new_idom as i64) {
                        idom.insert(b, new_idom as i64);
                        changed = true;
                    }
                }
            }
        }

        let mut children: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for (&b, &d) in idom.iter() {
            if d >= 0 {
                children.entry(d as BlockId).or_default().push(b);
            }
        }
        for kids in children.values_mut() {
            kids.sort_unstable();
        }

        let mut depth = FxHashMap::default();
        let mut preorder = Vec::new();
        let mut postorder = Vec::new();
        compute_preorder_depth(entry, 0, &children, &mut depth, &mut preorder);
        compute_postorder(entry, &children, &mut postorder);

        DominatorTree {
            idom,
            rpo_number,
            preorder,
            postorder,
            depth,
            children,
        }
    }

    /// Is `block` reachable from the entry?
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.idom.contains_key(&block)
    }

    /// Immediate dominator of `block`, or `None` for unreachable blocks and
    /// the entry (whose idom is conventionally `-1`).
    pub fn idom(&self, block: BlockId) -> Option<i64> {
        self.idom.get(&block).copied()
    }

    /// Depth in the dominator tree (entry = 0).
    pub fn depth(&self, block: BlockId) -> Option<u32> {
        self.depth.get(&block).copied()
    }

    /// `true` if `a` dominates `b` (reflexive: a block dominates itself).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return self.is_reachable(a);
        }
        self.strictly_dominates(a, b)
    }

    /// `true` if `a` strictly dominates `b` (`a != b`).
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            let d = self.idom.get(&cur).copied();
            match d {
                Some(d) if d >= 0 => {
                    let parent = d as BlockId;
                    if parent == a {
                        return true;
                    }
                    cur = parent;
                }
                _ => return false,
            }
        }
    }

    /// The set of blocks `a` dominates, including `a` itself.
    pub fn dominated_set(&self, a: BlockId) -> Vec<BlockId> {
        self.preorder
            .iter()
            .copied()
            .filter(|&b| self.dominates(a, b))
            .collect()
    }

    /// The blocks immediately dominated by `a` (its children in the tree).
    pub fn immediately_dominated_by(&self, a: BlockId) -> &[BlockId] {
        self.children.get(&a).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Preorder traversal of the dominator tree's reachable blocks.
    pub fn preorder(&self) -> &[BlockId] {
        &self.preorder
    }

    /// Postorder traversal of the dominator tree's reachable blocks.
    pub fn postorder(&self) -> &[BlockId] {
        &self.postorder
    }
}

fn intersect(
    mut a: BlockId,
    mut b: BlockId,
    idom: &FxHashMap<BlockId, i64>,
    rpo: &FxHashMap<BlockId, u32>,
) -> BlockId {
    while a != b {
        while rpo[&a] > rpo[&b] {
            a = idom[&a] as BlockId;
        }
        while rpo[&b] > rpo[&a] {
            b = idom[&b] as BlockId;
        }
    }
    a
}

/// Reverse postorder of blocks reachable from `entry`.
fn reverse_postorder(func: &Function, entry: BlockId) -> Vec<BlockId> {
    let mut visited = vec![false; func.blocks.len()];
    let mut postorder = Vec::new();
    let mut stack = vec![(entry, false)];
    while let Some((b, expanded)) = stack.pop() {
        if expanded {
            postorder.push(b);
            continue;
        }
        if visited[b as usize] {
            continue;
        }
        visited[b as usize] = true;
        stack.push((b, true));
        let mut succs: Vec<BlockId> = func.block(b).successors().to_vec();
        succs.sort_unstable();
        for s in succs.into_iter().rev() {
            if !visited[s as usize] {
                stack.push((s, false));
            }
        }
    }
    postorder.reverse();
    postorder
}

fn compute_preorder_depth(
    block: BlockId,
    depth_value: u32,
    children: &FxHashMap<BlockId, Vec<BlockId>>,
    depth: &mut FxHashMap<BlockId, u32>,
    preorder: &mut Vec<BlockId>,
) {
    depth.insert(block, depth_value);
    preorder.push(block);
    if let Some(kids) = children.get(&block) {
        for &k in kids {
            compute_preorder_depth(k, depth_value + 1, children, depth, preorder);
        }
    }
}

fn compute_postorder(
    block: BlockId,
    children: &FxHashMap<BlockId, Vec<BlockId>>,
    postorder: &mut Vec<BlockId>,
) {
    if let Some(kids) = children.get(&block) {
        for &k in kids {
            compute_postorder(k, children, postorder);
        }
    }
    postorder.push(block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Function;
    use crate::types::Type;

    /// entry -> a -> b
    ///       -> c -> b
    fn diamond() -> Function {
        let mut f = Function::new("main", Type::Void);
        let a = f.add_block("a");
        let c = f.add_block("c");
        let b = f.add_block("b");
        f.link(0, a);
        f.link(0, c);
        f.link(a, b);
        f.link(c, b);
        f
    }

    #[test]
    fn entry_has_no_idom() {
        let f = diamond();
        let dt = DominatorTree::compute(&f);
        assert_eq!(dt.idom(0), Some(-1));
        assert_eq!(dt.depth(0), Some(0));
    }

    #[test]
    fn diamond_merge_point_is_dominated_by_entry_not_branches() {
        let f = diamond();
        let dt = DominatorTree::compute(&f);
        // b's idom must be the entry (0), since neither a nor c alone dominates it.
        assert_eq!(dt.idom(2), Some(0));
        assert!(dt.dominates(0, 2));
        assert!(!dt.strictly_dominates(1, 2));
    }

    #[test]
    fn reflexive_transitive_antisymmetric() {
        let f = diamond();
        let dt = DominatorTree::compute(&f);
        for b in 0..4u32 {
            assert!(dt.dominates(b, b));
        }
        assert!(dt.dominates(0, 1) && dt.dominates(1, 1));
        assert!(!(dt.strictly_dominates(1, 0) && dt.strictly_dominates(0, 1)));
    }

    #[test]
    fn dominance_implies_depth_order() {
        let f = diamond();
        let dt = DominatorTree::compute(&f);
        for a in 0..4u32 {
            for b in 0..4u32 {
                if dt.is_reachable(a) && dt.is_reachable(b) && dt.dominates(a, b) {
                    assert!(dt.depth(a).unwrap() <= dt.depth(b).unwrap());
                }
            }
        }
    }

    #[test]
    fn unreachable_blocks_are_omitted() {
        let mut f = diamond();
        let dead = f.add_block("dead");
        let _ = dead;
        let dt = DominatorTree::compute(&f);
        assert!(!dt.is_reachable(4));
    }
}
