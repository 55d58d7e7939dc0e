//! Naive transfer-index engine (§4.5): the Brehelin/Gascuel/Martin
//! quadratic algorithm, kept as a correctness oracle for the fast
//! heavy-path engine (`--naive`, `--verify-fast`).
//!
//! For every reference edge `e` and every replicate edge `f`, the transfer
//! distance between their bipartitions is the minimum number of taxa that
//! would need to move sides to make them identical: the symmetric
//! difference between the two child-side taxon sets, taking whichever of
//! the two possible orientations (a bipartition and its complement
//! describe the same split) is smaller.

use crate::tree::Tree;

/// Per-reference-edge result: minimum transfer distance to any replicate
/// edge, and the topological depth needed for TBE normalization.
#[derive(Debug, Clone, Copy)]
pub struct NaiveResult {
    pub min_transfer: u32,
    pub topo_depth: usize,
}

/// Computes, for every reference edge, the minimum Hamming-folded transfer
/// distance to any (non-terminal) replicate edge.
///
/// This is deliberately the simplest correct algorithm: for each pair of
/// internal edges we intersect bitsets directly rather than maintaining
/// incremental counts, trading the asymptotic edge (O(n) per pair instead
/// of O(1) amortized) for an implementation short enough to trust by
/// inspection. Runtime is O(n^2 * p) per replicate of `p` taxa, matching
/// the documented naive complexity.
pub fn transfer_distances(reference: &Tree, replicate: &Tree) -> Vec<NaiveResult> {
    let n = reference.n_taxa();
    let ref_edges: Vec<u32> = reference
        .edges()
        .iter()
        .filter(|e| !e.is_terminal())
        .map(|e| e.id)
        .collect();
    let rep_edges: Vec<u32> = replicate
        .edges()
        .iter()
        .filter(|e| !e.is_terminal())
        .map(|e| e.id)
        .collect();

    let mut results = vec![
        NaiveResult {
            min_transfer: u32::MAX,
            topo_depth: 0,
        };
        reference.num_edges()
    ];

    for &ref_edge_id in &ref_edges {
        let ref_edge = reference.edge(ref_edge_id);
        let p_minus_1 = ref_edge.topo_depth.saturating_sub(1).max(1);
        let mut best = p_minus_1 as u32; // trivial upper bound: empty split

        for &rep_edge_id in &rep_edges {
            let rep_edge = replicate.edge(rep_edge_id);
            let dist = hamming_transfer_distance(
                &ref_edge.bitset,
                &rep_edge.bitset,
                n,
            );
            if dist < best {
                best = dist;
            }
        }

        results[ref_edge_id as usize] = NaiveResult {
            min_transfer: best,
            topo_depth: ref_edge.topo_depth,
        };
    }

    results
}

/// Transfer distance between two bipartitions: the smaller of the two
/// possible side-to-side Hamming distances (a bipartition and its
/// complement describe the same split).
fn hamming_transfer_distance(
    a: &crate::bitset::Bitset,
    b: &crate::bitset::Bitset,
    n: usize,
) -> u32 {
    let agree = a.intersection(b).count_ones() + a.complement().intersection(&b.complement()).count_ones();
    let disagree_same_orientation = n - agree;
    let agree_swapped = a.intersection(&b.complement()).count_ones() + a.complement().intersection(b).count_ones();
    let disagree_swapped = n - agree_swapped;
    disagree_same_orientation.min(disagree_swapped) as u32
}
