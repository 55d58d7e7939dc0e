//! Felsenstein Bootstrap Proportion (§4.4): for each reference edge, the
//! fraction of replicates that contain an edge inducing the exact same (or
//! complementary) bipartition.

use crate::tree::Tree;

/// For one replicate, returns a per-reference-edge hit mask: `true` at index
/// `i` iff some replicate edge induces the same (or complementary)
/// bipartition as reference edge `i`. Pure function of the two sealed trees
/// so it composes with parallel fold/reduce accumulation in the
/// orchestrator without any shared mutable state.
pub fn exact_hit_mask(reference: &Tree, replicate: &Tree) -> Vec<bool> {
    let mut hits = vec![false; reference.num_edges()];
    for rep_edge in replicate.edges() {
        if rep_edge.is_terminal() {
            continue;
        }
        for ref_edge in reference.edges() {
            if ref_edge.is_terminal() || ref_edge.topo_depth != rep_edge.topo_depth {
                continue;
            }
            if ref_edge.bitset.equal_or_complement(&rep_edge.bitset) {
                hits[ref_edge.id as usize] = true;
            }
        }
    }
    hits
}

/// Bumps `exact_hits` on `reference` for every edge `mask` marks as hit.
/// Used by tests and single-threaded call sites; the orchestrator instead
/// sums masks across replicates itself and writes the totals once.
pub fn accumulate_exact_matches(reference: &mut Tree, replicate: &Tree) {
    for (id, hit) in exact_hit_mask(reference, replicate).into_iter().enumerate() {
        if hit {
            reference.edge_mut(id as u32).exact_hits += 1;
        }
    }
}

/// Normalizes accumulated exact-match counts into FBP support values in
/// `[0, 1]`.
pub fn fbp_support(reference: &Tree, n_replicates: usize) -> Vec<f64> {
    if n_replicates == 0 {
        return vec![0.0; reference.num_edges()];
    }
    reference
        .edges()
        .iter()
        .map(|edge| edge.exact_hits as f64 / n_replicates as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxa::TaxonTable;
    use crate::tree::newick;

    fn sealed(newick_str: &str, table: &TaxonTable) -> Tree {
        let mut tree = newick::parse(newick_str).unwrap();
        tree.bind_taxa(table).unwrap();
        tree.seal().unwrap();
        tree
    }

    #[test]
    fn identical_trees_hit_every_internal_edge() {
        let table = TaxonTable::from_names(
            ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()),
        )
        .unwrap();
        let mut reference = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);
        let replicate = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);

        accumulate_exact_matches(&mut reference, &replicate);
        let support = fbp_support(&reference, 1);
        for (edge, &s) in reference.edges().iter().zip(&support) {
            if !edge.is_terminal() {
                assert_eq!(s, 1.0);
            }
        }
    }

    #[test]
    fn disjoint_bipartition_scores_zero() {
        let table = TaxonTable::from_names(
            ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()),
        )
        .unwrap();
        let mut reference = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);
        let replicate = sealed("((A:1,C:1):1,(B:1,D:1):1,E:1);", &table);

        accumulate_exact_matches(&mut reference, &replicate);
        let support = fbp_support(&reference, 1);
        assert!(support.iter().all(|&s| s == 0.0));
    }
}
