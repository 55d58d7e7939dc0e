//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules, leaves first:
//! - `bitset`: fixed-width bitset representation of a taxon subset.
//! - `error`: crate-wide error taxonomy (`TbeError`).
//! - `taxa`: canonical taxon table shared across all trees in a run.
//! - `tree`: arena-based rooted tree, Newick codec, bipartition pipeline.
//! - `fbp`: classical Felsenstein bootstrap proportion (exact matching).
//! - `naive`: O(n^2) transfer-index engine, the correctness oracle.
//! - `fast`: heavy-path / Heavy-Path Tree O(n log n)-style transfer-index engine.
//! - `transfer_set`: identifies the taxa behind a transfer index, not just its size.
//! - `config`: CLI surface and the validated `RunConfig`.
//! - `orchestrator`: loads the reference, streams replicates, aggregates support values.

pub mod bitset;
pub mod config;
pub mod error;
pub mod fast;
pub mod fbp;
pub mod naive;
pub mod orchestrator;
pub mod taxa;
pub mod transfer_set;
pub mod tree;

pub use error::{Result, TbeError};
