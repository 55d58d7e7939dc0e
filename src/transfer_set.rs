//! Transfer-set identification (§4.6.5): given a reference edge and the
//! single replicate that realised its minimum transfer distance, names the
//! taxa that would need to move sides to make the two bipartitions agree.
//!
//! The fast engine only ever reports the *size* of this set (`transfer_index`);
//! recovering its *identity* from the HPT would need the `include`/`exclude`
//! bookkeeping of §4.6.5, which this crate does not maintain since nothing
//! in the hot path needs it. Instead, once the best replicate edge is known,
//! this module recomputes the set directly from the two bitsets — O(n) in
//! the number of taxa, paid once per reference edge rather than once per
//! (ref edge, rep edge) pair.

use crate::bitset::Bitset;
use crate::taxa::TaxonTable;
use crate::tree::{Edge, Tree};

/// Scans every replicate edge (terminal edges included — the minimum is
/// routinely realised by one, since a terminal edge's singleton bitset is
/// often the closest match once the topological-depth bound `p-1` is small)
/// and returns the one whose folded Hamming distance to `ref_edge` equals
/// `target`, i.e. the edge the fast (or naive) engine found as the argmin.
/// Ties are broken by lowest edge id.
pub fn find_realising_edge<'a>(ref_edge: &Edge, replicate: &'a Tree, target: u32) -> Option<&'a Edge> {
    let n = replicate.n_taxa();
    replicate
        .edges()
        .iter()
        .find(|rep_edge| folded_distance(&ref_edge.bitset, &rep_edge.bitset, n) == target)
}

fn folded_distance(a: &Bitset, b: &Bitset, n: usize) -> u32 {
    let same = a.symmetric_difference(b).count_ones();
    same.min(n - same) as u32
}

/// The taxa that must change sides to turn `ref_edge`'s bipartition into
/// `rep_edge`'s, taking whichever of the two equivalent orientations yields
/// the smaller set (a bipartition and its complement are the same split).
pub fn transfer_set_taxa(ref_edge: &Edge, rep_edge: &Edge, table: &TaxonTable) -> Vec<String> {
    let same = ref_edge.bitset.symmetric_difference(&rep_edge.bitset);
    let swapped = ref_edge
        .bitset
        .symmetric_difference(&rep_edge.bitset.complement());
    let winner = if same.count_ones() <= swapped.count_ones() {
        same
    } else {
        swapped
    };
    winner
        .iter_ones()
        .map(|taxon_id| table.name(taxon_id).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::newick;

    fn sealed(newick_str: &str, table: &TaxonTable) -> Tree {
        let mut tree = newick::parse(newick_str).unwrap();
        tree.bind_taxa(table).unwrap();
        tree.seal().unwrap();
        tree
    }

    #[test]
    fn identical_bipartitions_have_empty_transfer_set() {
        let table =
            TaxonTable::from_names(["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()))
                .unwrap();
        let reference = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);
        let replicate = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);

        let ref_edge = reference
            .edges()
            .iter()
            .find(|e| !e.is_terminal() && e.bitset.get(0) && e.bitset.get(1))
            .unwrap();
        let rep_edge = find_realising_edge(ref_edge, &replicate, 0).unwrap();
        assert!(transfer_set_taxa(ref_edge, rep_edge, &table).is_empty());
    }

    #[test]
    fn single_leaf_swap_names_the_moved_taxon() {
        let table =
            TaxonTable::from_names(["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()))
                .unwrap();
        // Reference split {A,B,C}|{D,E}; replicate {A,B}|{C,D,E}: C moves.
        let reference = sealed("((A:1,B:1,C:1):1,D:1,E:1);", &table);
        let replicate = sealed("((A:1,B:1):1,(C:1,D:1):1,E:1);", &table);

        let ref_edge = reference
            .edges()
            .iter()
            .find(|e| e.bitset.count_ones() == 3)
            .unwrap();
        let rep_edge = find_realising_edge(ref_edge, &replicate, 1).unwrap();
        let taxa = transfer_set_taxa(ref_edge, rep_edge, &table);
        assert_eq!(taxa, vec!["C".to_string()]);
    }

    #[test]
    fn realising_edge_can_be_a_terminal_replicate_edge() {
        // SPEC_FULL §8 scenario 2: ref {A,B}|{C,D,E}, replicate {A,C}|{B,D,E}.
        // The non-terminal replicate edges {A,C} and {B,D} are both at
        // distance 2 from the reference split; only the terminal leaves A
        // and B sit at distance 1, so the realising edge must be a terminal.
        let table =
            TaxonTable::from_names(["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()))
                .unwrap();
        let reference = sealed("((A:1,B:1),(C:1,D:1),E:1);", &table);
        let replicate = sealed("((A:1,C:1),(B:1,D:1),E:1);", &table);

        let ref_edge = reference
            .edges()
            .iter()
            .find(|e| !e.is_terminal() && e.bitset.get(0) && e.bitset.get(1))
            .unwrap();
        let rep_edge = find_realising_edge(ref_edge, &replicate, 1).unwrap();
        assert!(rep_edge.is_terminal());
        let taxa = transfer_set_taxa(ref_edge, rep_edge, &table);
        assert_eq!(taxa, vec!["B".to_string()]);
    }
}
