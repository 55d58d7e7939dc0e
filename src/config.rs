//! CLI surface and the validated `RunConfig` the orchestrator consumes
//! (§6, §1.1). Parsing is `clap`'s derive API, mirroring the teacher's own
//! `Args` struct; everything clap can't express directly (thread count
//! defaulting, algorithm validation) is normalised in [`RunConfig::from_args`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{Result, TbeError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Algorithm {
    Tbe,
    Fbp,
}

/// Computes Transfer Bootstrap Expectation (or classical FBP) support for a
/// reference tree from a collection of replicate trees.
#[derive(Parser, Debug)]
#[command(name = "tbe", version, about = "Transfer Bootstrap Expectation support values")]
pub struct Args {
    /// Reference tree (single Newick tree).
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub reference: PathBuf,

    /// Replicate trees (one Newick tree per line or per ';'-terminated block).
    #[arg(short = 'b', long = "bootstrap", value_name = "PATH")]
    pub replicates: PathBuf,

    /// Output path for the annotated reference tree ('-' for stdout).
    #[arg(short = 'o', long = "output", value_name = "PATH", default_value = "-")]
    pub output: String,

    /// Support algorithm.
    #[arg(short = 'a', long = "algorithm", value_enum, default_value_t = Algorithm::Tbe)]
    pub algorithm: Algorithm,

    /// Worker threads (0 or unset uses all available cores).
    #[arg(short = '@', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Optional per-branch statistics output (TSV).
    #[arg(short = 'S', long = "stats", value_name = "PATH")]
    pub stats: Option<PathBuf>,

    /// PRNG seed. Retained for interface compatibility with the external
    /// shuffle/bootstrap-generation tooling this crate treats as out of
    /// scope; the core algorithms are fully deterministic and never consult
    /// it (see §1.1 of the design notes).
    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,

    /// Suppress progress logging (raises the default log level to `warn`).
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Force the O(n^2) naive engine instead of the fast heavy-path engine.
    #[arg(long = "naive", default_value_t = false)]
    pub naive: bool,

    /// Include the minimum transfer-set taxa in the stats file.
    #[arg(long = "transfer-set", default_value_t = false)]
    pub transfer_set: bool,

    /// Debug aid: run both engines on the first replicate and abort if they
    /// disagree.
    #[arg(long = "verify-fast", default_value_t = false)]
    pub verify_fast: bool,
}

/// Validated, in-memory form of the CLI arguments the orchestrator
/// actually consumes.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub reference: PathBuf,
    pub replicates: PathBuf,
    pub output: String,
    pub algorithm: Algorithm,
    pub threads: usize,
    pub stats: Option<PathBuf>,
    pub quiet: bool,
    pub force_naive: bool,
    pub transfer_set: bool,
    pub verify_fast: bool,
}

impl RunConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.transfer_set && args.stats.is_none() {
            return Err(TbeError::Invariant(
                "--transfer-set requires -S <path> (nowhere to write the transfer_taxa column)"
                    .to_string(),
            ));
        }
        let threads = if args.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            args.threads
        };
        Ok(RunConfig {
            reference: args.reference,
            replicates: args.replicates,
            output: args.output,
            algorithm: args.algorithm,
            threads,
            stats: args.stats,
            quiet: args.quiet,
            force_naive: args.naive,
            transfer_set: args.transfer_set,
            verify_fast: args.verify_fast,
        })
    }
}
