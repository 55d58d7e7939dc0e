//! Crate-wide error type.
//!
//! Mirrors the error-kind taxonomy of the reference design: syntax errors in
//! Newick input, taxon-set mismatches between reference and replicate, shape
//! violations that rule out the fast path, I/O failures, and internal
//! invariant violations (programming defects, never expected in practice).

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TbeError>;

#[derive(Debug, Error)]
pub enum TbeError {
    #[error("syntax error in Newick at byte {offset}: {message} (near {context:?})")]
    Syntax {
        offset: usize,
        message: String,
        context: String,
    },

    #[error("taxon {name:?} is not shared between the reference and this replicate")]
    TaxonMismatch { name: String },

    #[error("node {node} has degree {degree}, which the fast path cannot handle (binary internal nodes required, ternary root allowed)")]
    Shape { node: usize, degree: usize },

    #[error("I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl TbeError {
    pub fn syntax(offset: usize, message: impl Into<String>, context: impl Into<String>) -> Self {
        TbeError::Syntax {
            offset,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TbeError::Io {
            path: path.into(),
            source,
        }
    }

    /// The process exit code this error should map to at the CLI boundary.
    ///
    /// `InvariantViolated` is handled separately by `main` (it aborts
    /// immediately rather than propagating), so it is not expected to reach
    /// this method in practice, but is given a code for completeness.
    pub fn exit_code(&self) -> i32 {
        match self {
            TbeError::Invariant(_) => 1,
            _ => 1,
        }
    }
}
