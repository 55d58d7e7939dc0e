//! Canonical taxon table shared across all trees in a run.
//!
//! The first tree parsed (the reference) fixes the taxon order; every
//! subsequent tree (each replicate) is validated against it and its leaf
//! names are mapped onto the same `taxon_id` space. Once built, the table is
//! immutable for the rest of the run.

use crate::error::{Result, TbeError};
use std::collections::HashMap;

/// Ordered, immutable mapping between taxon names and dense integer ids.
#[derive(Debug, Clone)]
pub struct TaxonTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl TaxonTable {
    /// Builds a fresh table from the reference tree's leaf names, in the
    /// order they were encountered during parsing.
    pub fn from_names<I: IntoIterator<Item = String>>(names: I) -> Result<Self> {
        let names: Vec<String> = names.into_iter().collect();
        let mut index = HashMap::with_capacity(names.len());
        for (id, name) in names.iter().enumerate() {
            if index.insert(name.clone(), id).is_some() {
                return Err(TbeError::Invariant(format!(
                    "duplicate leaf name {name:?} in reference tree"
                )));
            }
        }
        Ok(TaxonTable { names, index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Looks up the taxon id for `name`, failing with `TaxonMismatch` if the
    /// table was already fixed and does not contain it.
    pub fn id_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TbeError::TaxonMismatch {
                name: name.to_string(),
            })
    }

    /// Validates that `names` is exactly the same set as this table's
    /// (irrespective of order): used to check a replicate's leaf set against
    /// the reference before the bijection is established.
    pub fn validate_same_set<'a, I: IntoIterator<Item = &'a str>>(&self, names: I) -> Result<()> {
        let mut seen = vec![false; self.len()];
        let mut count = 0;
        for name in names {
            let id = self.id_of(name)?;
            if std::mem::replace(&mut seen[id], true) {
                return Err(TbeError::Invariant(format!(
                    "duplicate leaf name {name:?} in replicate"
                )));
            }
            count += 1;
        }
        if count != self.len() {
            // Some reference taxon never showed up in the replicate.
            let missing = seen
                .iter()
                .position(|&s| !s)
                .map(|id| self.name(id).to_string())
                .unwrap_or_default();
            return Err(TbeError::TaxonMismatch { name: missing });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TaxonTable {
        TaxonTable::from_names(["A", "B", "C"].iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn ids_assigned_in_order() {
        let t = table();
        assert_eq!(t.id_of("A").unwrap(), 0);
        assert_eq!(t.id_of("B").unwrap(), 1);
        assert_eq!(t.id_of("C").unwrap(), 2);
    }

    #[test]
    fn unknown_taxon_is_mismatch() {
        let t = table();
        assert!(matches!(
            t.id_of("D"),
            Err(TbeError::TaxonMismatch { name }) if name == "D"
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let err = TaxonTable::from_names(["A", "A"].iter().map(|s| s.to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn validate_same_set_detects_extra_and_missing() {
        let t = table();
        assert!(t.validate_same_set(["A", "B", "C"]).is_ok());
        assert!(t.validate_same_set(["A", "B", "D"]).is_err());
        assert!(t.validate_same_set(["A", "B"]).is_err());
    }
}
