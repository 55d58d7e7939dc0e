//! Heavy-Path Tree (§4.6.3): a lazily-propagated segment tree over each
//! heavy path, glued together through the light-child attachment points,
//! supporting `add_leaf`/`reset_leaf` in amortized O(log^2 n).
//!
//! # The quantity being tracked
//!
//! For a replicate node `v`, `d(u, v) = d0(v) + |L(u)| - 2|L(u) ∩ L'(v)|`
//! where `u` is whatever reference node is currently being marked against.
//! Marking one more leaf of `L(u)` changes every `d(u, v)` by exactly `+1`,
//! except for `v`'s that are ancestors of (or equal to) the marked leaf,
//! which instead change by `-1`. Tracking `d' = d - (leaves marked so far)`
//! turns this into: ancestors-of-the-marked-leaf get `-2`, everyone else is
//! untouched. That is a plain prefix range-add over the O(log n) path
//! segments the marked leaf's ancestor chain passes through — which is
//! exactly what a heavy-path-indexed segment tree is good at. The true
//! `d` value is recovered as `d' + marks_applied` when read out.

use crate::tree::{NodeId, Tree};

use super::heavy_path::{self, Decomposition};

const INF: i64 = i64::MAX / 4;

struct PtNode {
    lo: u32,
    hi: u32,
    left: Option<u32>,
    right: Option<u32>,
    /// `Some` iff this node is a path-tree leaf, i.e. `hi - lo == 1`.
    rep_node: Option<NodeId>,
    diff_path: i64,
    d_min_path: i64,
    d_max_path: i64,
    d_min_subtree: i64,
    d_max_subtree: i64,
}

/// A Heavy-Path Tree built for one replicate tree. Rebuilt once per
/// replicate (it bakes in that tree's specific decomposition), then
/// `add_leaf`/`reset_leaf` are called many times — once per reference
/// leaf that walks past it — before being discarded.
pub struct Hpt {
    arena: Vec<PtNode>,
    path_root: Vec<u32>,
    child_paths_at: Vec<Vec<u32>>,
    /// `route_by_taxon[taxon_id]` = the ordered `(path_id, idx)` pairs
    /// covering that taxon's full ancestor chain, root-path first.
    route_by_taxon: Vec<Vec<(u32, u32)>>,
    root_path: u32,
    marks_applied: i64,
}

impl Hpt {
    pub fn build(tree: &Tree) -> Hpt {
        let decomp = heavy_path::decompose(tree);
        let mut arena = Vec::new();
        let mut path_root: Vec<Option<u32>> = vec![None; decomp.paths.len()];

        for path_id in 0..decomp.paths.len() as u32 {
            ensure_path_built(path_id, &decomp, tree, &mut arena, &mut path_root);
        }
        let path_root: Vec<u32> = path_root.into_iter().map(|r| r.unwrap()).collect();

        let n_taxa = tree.n_taxa();
        let mut route_by_taxon = Vec::with_capacity(n_taxa);
        for taxon_id in 0..n_taxa {
            let leaf = tree.leaf_for_taxon(taxon_id);
            route_by_taxon.push(leaf_route(leaf, tree, &decomp));
        }

        let root_path = decomp.path_of[tree.root() as usize];

        Hpt {
            arena,
            path_root,
            child_paths_at: decomp.child_paths_at,
            route_by_taxon,
            root_path,
            marks_applied: 0,
        }
    }

    /// Marks taxon `taxon_id`'s leaf as part of the reference node currently
    /// being computed.
    pub fn add_leaf(&mut self, taxon_id: usize) {
        self.apply(taxon_id, -2);
        self.marks_applied += 1;
    }

    /// Undoes a previous `add_leaf` for the same taxon.
    pub fn reset_leaf(&mut self, taxon_id: usize) {
        self.apply(taxon_id, 2);
        self.marks_applied -= 1;
    }

    fn apply(&mut self, taxon_id: usize, delta: i64) {
        let route = self.route_by_taxon[taxon_id].clone();
        for &(path_id, idx) in &route {
            let root = self.path_root[path_id as usize];
            range_update_prefix(&mut self.arena, root, idx, delta);
        }
        // Bubble the deepest path's summary up into each enclosing path's
        // hosting leaf, deepest first.
        for pair in route.windows(2).rev() {
            let (parent_path, parent_idx) = pair[0];
            let root = self.path_root[parent_path as usize];
            let real_node = self.leaf_at(parent_path, parent_idx);
            let (new_min, new_max) = self.combined_children_extrema(real_node);
            set_subtree_at(&mut self.arena, root, parent_idx, new_min, new_max);
        }
    }

    fn leaf_at(&self, path_id: u32, idx: u32) -> NodeId {
        let mut node_id = self.path_root[path_id as usize];
        loop {
            let node = &self.arena[node_id as usize];
            if let Some(real) = node.rep_node {
                return real;
            }
            let left = node.left.unwrap();
            node_id = if idx < self.arena[left as usize].hi {
                left
            } else {
                node.right.unwrap()
            };
        }
    }

    fn combined_children_extrema(&self, real_node: NodeId) -> (i64, i64) {
        let mut min = INF;
        let mut max = -INF;
        for &cp in &self.child_paths_at[real_node as usize] {
            let root = self.path_root[cp as usize];
            let node = &self.arena[root as usize];
            min = min.min(node.d_min_path.min(node.d_min_subtree));
            max = max.max(node.d_max_path.max(node.d_max_subtree));
        }
        (min, max)
    }

    /// The current minimum and maximum of `d(u, ·)` over every replicate
    /// node, where `u` is the reference node whose light leaves have been
    /// marked so far. This is what the reference-side walk reads after
    /// each node's marks are applied.
    pub fn root_min_max(&self) -> (i64, i64) {
        let root = self.path_root[self.root_path as usize];
        let node = &self.arena[root as usize];
        let d_min = node.d_min_path.min(node.d_min_subtree) + self.marks_applied;
        let d_max = node.d_max_path.max(node.d_max_subtree) + self.marks_applied;
        (d_min, d_max)
    }
}

fn ensure_path_built(
    path_id: u32,
    decomp: &Decomposition,
    tree: &Tree,
    arena: &mut Vec<PtNode>,
    path_root: &mut Vec<Option<u32>>,
) -> u32 {
    if let Some(root) = path_root[path_id as usize] {
        return root;
    }
    for &node in &decomp.paths[path_id as usize] {
        for &cp in &decomp.child_paths_at[node as usize] {
            ensure_path_built(cp, decomp, tree, arena, path_root);
        }
    }
    let path_nodes = &decomp.paths[path_id as usize];
    let root = build_range(
        path_nodes,
        &decomp.child_paths_at,
        tree,
        arena,
        path_root,
        0,
        path_nodes.len() as u32,
    );
    path_root[path_id as usize] = Some(root);
    root
}

fn build_range(
    path_nodes: &[NodeId],
    child_paths_at: &[Vec<u32>],
    tree: &Tree,
    arena: &mut Vec<PtNode>,
    path_root: &[Option<u32>],
    lo: u32,
    hi: u32,
) -> u32 {
    if hi - lo == 1 {
        let real = path_nodes[lo as usize];
        let own_d = tree.node(real).subtree_size as i64;
        let mut d_min_subtree = INF;
        let mut d_max_subtree = -INF;
        for &cp in &child_paths_at[real as usize] {
            let root = path_root[cp as usize].expect("child heavy path built before parent");
            let node = &arena[root as usize];
            d_min_subtree = d_min_subtree.min(node.d_min_path.min(node.d_min_subtree));
            d_max_subtree = d_max_subtree.max(node.d_max_path.max(node.d_max_subtree));
        }
        let id = arena.len() as u32;
        arena.push(PtNode {
            lo,
            hi,
            left: None,
            right: None,
            rep_node: Some(real),
            diff_path: 0,
            d_min_path: own_d,
            d_max_path: own_d,
            d_min_subtree,
            d_max_subtree,
        });
        return id;
    }

    let mid = lo + (hi - lo) / 2;
    let left = build_range(path_nodes, child_paths_at, tree, arena, path_root, lo, mid);
    let right = build_range(path_nodes, child_paths_at, tree, arena, path_root, mid, hi);
    let id = arena.len() as u32;
    let d_min_path = arena[left as usize].d_min_path.min(arena[right as usize].d_min_path);
    let d_max_path = arena[left as usize].d_max_path.max(arena[right as usize].d_max_path);
    let d_min_subtree = arena[left as usize]
        .d_min_subtree
        .min(arena[right as usize].d_min_subtree);
    let d_max_subtree = arena[left as usize]
        .d_max_subtree
        .max(arena[right as usize].d_max_subtree);
    arena.push(PtNode {
        lo,
        hi,
        left: Some(left),
        right: Some(right),
        rep_node: None,
        diff_path: 0,
        d_min_path,
        d_max_path,
        d_min_subtree,
        d_max_subtree,
    });
    id
}

/// Adds `delta` to `d_min_path`/`d_max_path` over the prefix `[0, end_idx]`
/// of the path rooted at `node_id`.
fn range_update_prefix(arena: &mut [PtNode], node_id: u32, end_idx: u32, delta: i64) {
    let (lo, hi) = (arena[node_id as usize].lo, arena[node_id as usize].hi);
    if lo > end_idx {
        return;
    }
    if hi - 1 <= end_idx {
        let n = &mut arena[node_id as usize];
        n.d_min_path += delta;
        n.d_max_path += delta;
        n.diff_path += delta;
        return;
    }

    let diff = arena[node_id as usize].diff_path;
    let (left, right) = (
        arena[node_id as usize].left.unwrap(),
        arena[node_id as usize].right.unwrap(),
    );
    if diff != 0 {
        for &child in &[left, right] {
            arena[child as usize].d_min_path += diff;
            arena[child as usize].d_max_path += diff;
            arena[child as usize].diff_path += diff;
        }
        arena[node_id as usize].diff_path = 0;
    }

    range_update_prefix(arena, left, end_idx, delta);
    range_update_prefix(arena, right, end_idx, delta);

    let d_min_path = arena[left as usize].d_min_path.min(arena[right as usize].d_min_path);
    let d_max_path = arena[left as usize].d_max_path.max(arena[right as usize].d_max_path);
    let n = &mut arena[node_id as usize];
    n.d_min_path = d_min_path;
    n.d_max_path = d_max_path;
}

/// Overwrites the `d_min_subtree`/`d_max_subtree` of the path-tree leaf at
/// `idx` and bubbles the change up to `node_id`'s path root.
fn set_subtree_at(arena: &mut [PtNode], node_id: u32, idx: u32, new_min: i64, new_max: i64) {
    if arena[node_id as usize].rep_node.is_some() {
        arena[node_id as usize].d_min_subtree = new_min;
        arena[node_id as usize].d_max_subtree = new_max;
        return;
    }
    let left = arena[node_id as usize].left.unwrap();
    let right = arena[node_id as usize].right.unwrap();
    if idx < arena[left as usize].hi {
        set_subtree_at(arena, left, idx, new_min, new_max);
    } else {
        set_subtree_at(arena, right, idx, new_min, new_max);
    }
    let d_min_subtree = arena[left as usize]
        .d_min_subtree
        .min(arena[right as usize].d_min_subtree);
    let d_max_subtree = arena[left as usize]
        .d_max_subtree
        .max(arena[right as usize].d_max_subtree);
    let n = &mut arena[node_id as usize];
    n.d_min_subtree = d_min_subtree;
    n.d_max_subtree = d_max_subtree;
}

/// Builds `leaf`'s route: for each heavy path its ancestor chain passes
/// through (root-most first), the `(path_id, idx)` of the deepest node on
/// that path still on the chain.
fn leaf_route(leaf: NodeId, tree: &Tree, decomp: &Decomposition) -> Vec<(u32, u32)> {
    let mut route = Vec::new();
    let mut cur = leaf;
    loop {
        let path_id = decomp.path_of[cur as usize];
        let idx = decomp.pos_in_path[cur as usize];
        route.push((path_id, idx));
        let top = decomp.paths[path_id as usize][0];
        match tree.node(top).parent {
            None => break,
            Some(parent) => cur = parent,
        }
    }
    route.reverse();
    route
}
