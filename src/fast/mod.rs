//! The fast transfer-index engine (§4.6): heavy-path decomposition of the
//! replicate tree, a Heavy-Path Tree with lazy range updates (or a direct
//! O(log n) fallback for provably balanced replicates), and a reference-side
//! heavy-path walk that drives the marking.

pub mod balanced;
pub mod engine;
pub mod heavy_path;
pub mod hpt;

pub use engine::compute;
