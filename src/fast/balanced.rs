//! Direct O(log n)-per-leaf fallback for provably balanced replicates
//! (§4.6.4): skips building a Heavy-Path Tree and instead walks straight
//! from a marked leaf up to the root, since a balanced tree already
//! guarantees that walk is logarithmic.

use crate::tree::{NodeId, Tree};

pub struct BalancedEngine<'a> {
    tree: &'a Tree,
    d: Vec<i64>,
    subtree_min: Vec<i64>,
    subtree_max: Vec<i64>,
    marks_applied: i64,
}

impl<'a> BalancedEngine<'a> {
    pub fn build(tree: &'a Tree) -> Self {
        let d: Vec<i64> = tree.nodes().iter().map(|n| n.subtree_size as i64).collect();
        let mut engine = BalancedEngine {
            tree,
            d,
            subtree_min: vec![0; tree.num_nodes()],
            subtree_max: vec![0; tree.num_nodes()],
            marks_applied: 0,
        };
        for &node_id in tree.postorder().iter() {
            engine.recompute_aggregate(node_id);
        }
        engine
    }

    fn recompute_aggregate(&mut self, node_id: NodeId) {
        let node = self.tree.node(node_id);
        let mut min = self.d[node_id as usize];
        let mut max = self.d[node_id as usize];
        for &child in &node.children {
            min = min.min(self.subtree_min[child as usize]);
            max = max.max(self.subtree_max[child as usize]);
        }
        self.subtree_min[node_id as usize] = min;
        self.subtree_max[node_id as usize] = max;
    }

    pub fn add_leaf(&mut self, taxon_id: usize) {
        self.apply(taxon_id, -2);
        self.marks_applied += 1;
    }

    pub fn reset_leaf(&mut self, taxon_id: usize) {
        self.apply(taxon_id, 2);
        self.marks_applied -= 1;
    }

    fn apply(&mut self, taxon_id: usize, delta: i64) {
        let leaf = self.tree.leaf_for_taxon(taxon_id);
        let mut cur = Some(leaf);
        while let Some(node_id) = cur {
            self.d[node_id as usize] += delta;
            cur = self.tree.node(node_id).parent;
        }
        let mut cur = Some(leaf);
        while let Some(node_id) = cur {
            self.recompute_aggregate(node_id);
            cur = self.tree.node(node_id).parent;
        }
    }

    pub fn root_min_max(&self) -> (i64, i64) {
        let root = self.tree.root();
        (
            self.subtree_min[root as usize] + self.marks_applied,
            self.subtree_max[root as usize] + self.marks_applied,
        )
    }
}

/// True iff every internal node's children have subtree sizes differing by
/// at most 1 — the precondition under which the direct walk above is
/// already O(log n) and a Heavy-Path Tree buys nothing.
pub fn is_provably_balanced(tree: &Tree) -> bool {
    tree.nodes().iter().all(|node| {
        if node.children.len() < 2 {
            return true;
        }
        let sizes: Vec<u32> = node
            .children
            .iter()
            .map(|&c| tree.node(c).subtree_size)
            .collect();
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        max - min <= 1
    })
}
