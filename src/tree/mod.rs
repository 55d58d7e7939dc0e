//! Rooted phylogenetic tree, stored as an arena of nodes and edges addressed
//! by dense integer ids rather than a pointer graph.
//!
//! A tree goes through a small lifecycle: built by the Newick parser
//! ([`newick::parse`]), bound to a shared [`TaxonTable`](crate::taxa::TaxonTable)
//! (assigning each leaf a `taxon_id`), then sealed by the bipartition
//! pipeline ([`bipartition::seal`]), which fills in bitsets, topological
//! depths, heavy children and light-leaf lists. After sealing, the only
//! writes permitted are to the per-node/per-edge scratch fields the TI
//! engines use, and those must be reset before the structures are reused for
//! another replicate.

pub mod bipartition;
pub mod newick;

use crate::bitset::Bitset;
use crate::error::{Result, TbeError};
use crate::taxa::TaxonTable;

/// Minimum representable branch length. Parsed lengths shorter than this
/// (including absent lengths, which default to 0) are floored to it.
pub const MIN_BRLEN: f64 = 1e-10;

pub type NodeId = u32;
pub type EdgeId = u32;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub parent_edge: Option<EdgeId>,
    pub children: Vec<NodeId>,
    /// Parallel to `children`: the edge connecting this node to `children[i]`.
    pub child_edges: Vec<EdgeId>,
    pub name: Option<String>,
    /// Set once the tree is bound to a [`TaxonTable`]; `Some` only for leaves.
    pub taxon_id: Option<usize>,
    /// Number of leaves in this node's subtree. Filled by `seal`.
    pub subtree_size: u32,
    /// Index into `children`/`child_edges` of the heavy child, per the
    /// largest-subtree / lowest-index tie-break rule. Filled by `seal`;
    /// `None` for leaves.
    pub heavy_child: Option<usize>,
    /// Flattened list of leaves in all *light* (non-heavy) child subtrees.
    /// Filled by `seal`; empty for leaves.
    pub light_leaves: Vec<NodeId>,

    // --- fast-engine scratch, reset per (ref, rep) computation ---
    pub ti_min: u32,
    pub ti_max: u32,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: Option<String>) -> Self {
        Node {
            id,
            parent: None,
            parent_edge: None,
            children: Vec::new(),
            child_edges: Vec::new(),
            name,
            taxon_id: None,
            subtree_size: 0,
            heavy_child: None,
            light_leaves: Vec::new(),
            ti_min: 0,
            ti_max: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.children.len() + usize::from(self.parent.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub parent: NodeId,
    pub child: NodeId,
    pub length: f64,
    pub support: Option<f64>,
    /// Bitset of taxa on the child side of this edge. Empty (zero bits)
    /// before `seal`.
    pub bitset: Bitset,
    /// `min(|child side|, n - |child side|)`. Filled by `seal`.
    pub topo_depth: usize,

    // --- engine result scratch, overwritten by whichever engine last ran ---
    pub transfer_index: Option<u32>,
    pub exact_hits: u32,
}

impl Edge {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.topo_depth <= 1
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    root: NodeId,
    /// Number of taxa this tree is bound to (0 before `bind_taxa`).
    n_taxa: usize,
    /// `leaves_by_taxon[taxon_id]` = the `NodeId` of that taxon's leaf.
    /// Populated by `bind_taxa`; the shared `taxon_id` space is what lets
    /// two trees built independently be compared without a literal
    /// cross-tree pointer (the "mutual other pointer" of the design notes).
    leaves_by_taxon: Vec<NodeId>,
    sealed: bool,
}

impl Tree {
    pub(crate) fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>, root: NodeId) -> Self {
        Tree {
            nodes,
            edges,
            root,
            n_taxa: 0,
            leaves_by_taxon: Vec::new(),
            sealed: false,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id as usize]
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.n_taxa
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Leaf node ids, in arena order (not taxon order; use
    /// [`Tree::leaf_for_taxon`] once bound).
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
    }

    pub fn leaf_for_taxon(&self, taxon_id: usize) -> NodeId {
        self.leaves_by_taxon[taxon_id]
    }

    /// Post-order node id sequence (children fully visited before parent).
    /// Stack-based (no recursion), matching the non-recursive arena style.
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, 0usize)];
        while let Some((node, child_idx)) = stack.pop() {
            let children = &self.nodes[node as usize].children;
            if child_idx < children.len() {
                stack.push((node, child_idx + 1));
                stack.push((children[child_idx], 0));
            } else {
                order.push(node);
            }
        }
        order
    }

    /// Binds this tree's leaves to taxon ids from `table`, building
    /// `leaves_by_taxon`. For the reference tree, `table` should be built
    /// fresh from this tree's own leaf names (see
    /// [`TaxonTable::from_names`]); for a replicate, `table` is the
    /// reference's table and mismatches surface as
    /// [`TbeError::TaxonMismatch`].
    pub fn bind_taxa(&mut self, table: &TaxonTable) -> Result<()> {
        let mut leaves_by_taxon = vec![u32::MAX; table.len()];
        let mut count = 0usize;
        for node in &mut self.nodes {
            if !node.is_leaf() {
                continue;
            }
            let name = node
                .name
                .as_deref()
                .ok_or_else(|| TbeError::Invariant(format!("leaf node {} has no name", node.id)))?;
            let taxon_id = table.id_of(name)?;
            if leaves_by_taxon[taxon_id] != u32::MAX {
                return Err(TbeError::Invariant(format!(
                    "duplicate leaf name {name:?} in tree"
                )));
            }
            leaves_by_taxon[taxon_id] = node.id;
            node.taxon_id = Some(taxon_id);
            count += 1;
        }
        if count != table.len() {
            return Err(TbeError::Invariant(format!(
                "tree has {count} leaves but taxon table has {} entries",
                table.len()
            )));
        }
        self.n_taxa = table.len();
        self.leaves_by_taxon = leaves_by_taxon;
        Ok(())
    }

    /// Runs the bipartition pipeline (§4.2) and marks the tree sealed.
    pub fn seal(&mut self) -> Result<()> {
        bipartition::seal(self)?;
        self.sealed = true;
        Ok(())
    }

    /// Clears the fast-engine scratch fields (`ti_min`/`ti_max` on nodes,
    /// `transfer_index` on edges) so the tree can be reused for the next
    /// replicate comparison.
    pub fn reset_scratch(&mut self) {
        for node in &mut self.nodes {
            node.ti_min = 0;
            node.ti_max = 0;
        }
        for edge in &mut self.edges {
            edge.transfer_index = None;
        }
    }

    /// True iff every internal non-root node is binary and the root has
    /// degree 2 or 3 (the fast path's shape requirement, §1/§9).
    pub fn is_fast_path_shape(&self) -> std::result::Result<(), TbeError> {
        for node in &self.nodes {
            if node.is_leaf() {
                continue;
            }
            let ok = if node.id == self.root {
                node.children.len() == 2 || node.children.len() == 3
            } else {
                node.children.len() == 2
            };
            if !ok {
                return Err(TbeError::Shape {
                    node: node.id as usize,
                    degree: node.children.len(),
                });
            }
        }
        Ok(())
    }
}
