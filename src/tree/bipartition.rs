//! Bipartition pipeline (§4.2): a single post-order pass that fills in every
//! edge's child-side bitset, derives topological depth, and — in the same
//! pass — designates each internal node's heavy child and collects the
//! flattened light-leaf list the fast engine needs.

use crate::bitset::Bitset;
use crate::error::{Result, TbeError};
use crate::tree::{NodeId, Tree};

pub fn seal(tree: &mut Tree) -> Result<()> {
    let n = tree.n_taxa();
    if n == 0 {
        return Err(TbeError::Invariant(
            "seal() called before bind_taxa()".to_string(),
        ));
    }

    let order = tree.postorder();

    for &node_id in &order {
        let (subtree_size, bitset) = if tree.node(node_id).is_leaf() {
            let taxon_id = tree.node(node_id).taxon_id.ok_or_else(|| {
                TbeError::Invariant(format!("leaf {node_id} has no taxon id"))
            })?;
            let mut bs = Bitset::zeros(n);
            bs.set(taxon_id);
            (1u32, bs)
        } else {
            let mut bs = Bitset::zeros(n);
            let mut size = 0u32;
            for &edge_id in &tree.node(node_id).child_edges {
                let child_bitset = tree.edge(edge_id).bitset.clone();
                size += child_bitset.count_ones() as u32;
                bs.or_assign(&child_bitset);
            }
            (size, bs)
        };

        tree.node_mut(node_id).subtree_size = subtree_size;
        if let Some(parent_edge) = tree.node(node_id).parent_edge {
            let topo_depth = bitset.count_ones().min(n - bitset.count_ones());
            let edge = tree.edge_mut(parent_edge);
            edge.bitset = bitset;
            edge.topo_depth = topo_depth.max(1);
        }

        if !tree.node(node_id).is_leaf() {
            set_heavy_child_and_light_leaves(tree, node_id);
        }
    }

    Ok(())
}

/// Picks the heavy child (largest subtree, ties to lowest child index) and
/// records, for this node, the flattened list of leaves under every *other*
/// (light) child.
fn set_heavy_child_and_light_leaves(tree: &mut Tree, node_id: NodeId) {
    let children = tree.node(node_id).children.clone();
    debug_assert!(!children.is_empty());

    let mut heavy_idx = 0usize;
    let mut heavy_size = tree.node(children[0]).subtree_size;
    for (idx, &child) in children.iter().enumerate().skip(1) {
        let size = tree.node(child).subtree_size;
        if size > heavy_size {
            heavy_size = size;
            heavy_idx = idx;
        }
    }

    let mut light_leaves = Vec::new();
    for (idx, &child) in children.iter().enumerate() {
        if idx == heavy_idx {
            continue;
        }
        collect_leaves(tree, child, &mut light_leaves);
    }

    let node = tree.node_mut(node_id);
    node.heavy_child = Some(heavy_idx);
    node.light_leaves = light_leaves;
}

fn collect_leaves(tree: &Tree, root: NodeId, out: &mut Vec<NodeId>) {
    // Root's own children are handled per the design-note fix: recurse once
    // into each child direction rather than double-visiting the first one.
    let mut stack = vec![root];
    while let Some(node_id) = stack.pop() {
        let node = tree.node(node_id);
        if node.is_leaf() {
            out.push(node_id);
        } else {
            stack.extend(node.children.iter().copied());
        }
    }
}
