//! Orchestration (§4.7): loads the reference once, streams replicates,
//! dispatches (reference, replicate) pairs to a `rayon` thread pool, folds
//! per-edge distance sums, normalises into support values, and emits the
//! annotated reference tree plus the optional per-branch stats file.

use std::fs;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::{Algorithm, RunConfig};
use crate::error::{Result, TbeError};
use crate::fast;
use crate::fbp;
use crate::naive;
use crate::taxa::TaxonTable;
use crate::transfer_set;
use crate::tree::{newick, Tree};

/// Counters surfaced to `main` for end-of-run logging.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: u64,
    pub skipped_syntax: u64,
    pub skipped_taxon_mismatch: u64,
    pub fast_path_fallbacks: u64,
    pub read_secs: f64,
    pub compute_secs: f64,
    pub write_secs: f64,
}

enum SkipReason {
    Syntax(TbeError),
    TaxonMismatch(TbeError),
}

enum Outcome {
    Tbe {
        /// Per reference-edge-id folded min transfer distance (only
        /// meaningful for non-terminal edges).
        min_dist: Vec<u32>,
        used_naive_fallback: bool,
    },
    Fbp {
        hit: Vec<bool>,
    },
}

/// A single worker's partial accumulation; merged pairwise by `reduce`.
struct Accum {
    sum_min: Vec<u64>,
    hit_counts: Vec<u32>,
    /// Per edge: `(min_dist, replicate_index)` of the best replicate seen so
    /// far, for `--transfer-set`. Comparison is `(dist asc, index asc)`,
    /// which keeps the overall result independent of how `reduce` happens
    /// to associate partial results.
    best: Vec<Option<(u32, u64)>>,
    processed: u64,
    skipped_syntax: u64,
    skipped_taxon_mismatch: u64,
    fast_path_fallbacks: u64,
}

impl Accum {
    fn new(num_edges: usize) -> Self {
        Accum {
            sum_min: vec![0; num_edges],
            hit_counts: vec![0; num_edges],
            best: vec![None; num_edges],
            processed: 0,
            skipped_syntax: 0,
            skipped_taxon_mismatch: 0,
            fast_path_fallbacks: 0,
        }
    }

    fn add_tbe(&mut self, min_dist: &[u32], replicate_index: u64, used_fallback: bool) {
        for (id, &d) in min_dist.iter().enumerate() {
            self.sum_min[id] += d as u64;
            let candidate = (d, replicate_index);
            self.best[id] = Some(match self.best[id] {
                Some(current) if current <= candidate => current,
                _ => candidate,
            });
        }
        self.processed += 1;
        if used_fallback {
            self.fast_path_fallbacks += 1;
        }
    }

    fn add_fbp(&mut self, hit: &[bool]) {
        for (id, &h) in hit.iter().enumerate() {
            if h {
                self.hit_counts[id] += 1;
            }
        }
        self.processed += 1;
    }

    fn merge(mut self, other: Accum) -> Accum {
        for i in 0..self.sum_min.len() {
            self.sum_min[i] += other.sum_min[i];
            self.hit_counts[i] += other.hit_counts[i];
            self.best[i] = match (self.best[i], other.best[i]) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, b) => b,
            };
        }
        self.processed += other.processed;
        self.skipped_syntax += other.skipped_syntax;
        self.skipped_taxon_mismatch += other.skipped_taxon_mismatch;
        self.fast_path_fallbacks += other.fast_path_fallbacks;
        self
    }
}

/// Per-edge normalised result, one row of the eventual stats file.
pub struct EdgeSupport {
    pub edge_id: u32,
    pub topo_depth: usize,
    pub mean_min_dist: f64,
    pub support: f64,
    pub transfer_taxa: Option<Vec<String>>,
}

pub fn run(config: &RunConfig) -> Result<(Tree, Vec<EdgeSupport>, RunSummary)> {
    let mut summary = RunSummary::default();

    let t_read = Instant::now();
    let ref_src = fs::read_to_string(&config.reference)
        .map_err(|e| TbeError::io(config.reference.clone(), e))?;
    let mut reference = newick::parse(&ref_src)?;
    let leaf_names: Vec<String> = reference
        .leaves()
        .map(|id| {
            reference
                .node(id)
                .name
                .clone()
                .ok_or_else(|| TbeError::Invariant(format!("reference leaf {id} has no name")))
        })
        .collect::<Result<_>>()?;
    let taxon_table = TaxonTable::from_names(leaf_names)?;
    reference.bind_taxa(&taxon_table)?;
    reference.seal()?;

    let reference_fast_ok = config.algorithm == Algorithm::Tbe
        && !config.force_naive
        && reference.is_fast_path_shape().is_ok();
    if config.algorithm == Algorithm::Tbe && !config.force_naive && !reference_fast_ok {
        log::info!(
            "reference tree is not binary-shaped; falling back to the naive engine for this run"
        );
    }

    let records = read_replicate_records(&config.replicates)?;
    summary.read_secs = t_read.elapsed().as_secs_f64();
    log::info!(
        "read {} taxa, {} replicate records from {:?}",
        taxon_table.len(),
        records.len(),
        config.replicates
    );

    let t_compute = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| TbeError::Invariant(format!("failed to build thread pool: {e}")))?;

    let num_edges = reference.num_edges();
    let reference_ref = &reference;
    let taxon_table_ref = &taxon_table;
    let accum = pool.install(|| {
        records
            .par_iter()
            .enumerate()
            .fold(
                || Accum::new(num_edges),
                |mut acc, (idx, record)| {
                    match process_one(
                        reference_ref,
                        taxon_table_ref,
                        record,
                        reference_fast_ok,
                        config.algorithm,
                    ) {
                        Ok(Outcome::Tbe {
                            min_dist,
                            used_naive_fallback,
                        }) => acc.add_tbe(&min_dist, idx as u64, used_naive_fallback),
                        Ok(Outcome::Fbp { hit }) => acc.add_fbp(&hit),
                        Err(SkipReason::Syntax(e)) => {
                            log::warn!("replicate {idx} skipped (syntax error): {e}");
                            acc.skipped_syntax += 1;
                        }
                        Err(SkipReason::TaxonMismatch(e)) => {
                            log::warn!("replicate {idx} skipped (taxon mismatch): {e}");
                            acc.skipped_taxon_mismatch += 1;
                        }
                    }
                    acc
                },
            )
            .reduce(|| Accum::new(num_edges), Accum::merge)
    });
    summary.compute_secs = t_compute.elapsed().as_secs_f64();
    summary.processed = accum.processed;
    summary.skipped_syntax = accum.skipped_syntax;
    summary.skipped_taxon_mismatch = accum.skipped_taxon_mismatch;
    summary.fast_path_fallbacks = accum.fast_path_fallbacks;

    if config.verify_fast {
        verify_fast_against_naive(&reference, &records, &taxon_table)?;
    }

    let needed_transfer_set_idxs: Vec<u64> = if config.transfer_set {
        accum
            .best
            .iter()
            .filter_map(|b| b.map(|(_, idx)| idx))
            .collect()
    } else {
        Vec::new()
    };
    let resolved_transfer_sets = if !needed_transfer_set_idxs.is_empty() {
        resolve_transfer_sets(&reference, &records, &taxon_table, &accum.best)?
    } else {
        vec![None; num_edges]
    };

    // Terminal edges get the conventional support value (1.0) but are not
    // rows in their own right: the stats file is one row per *internal*
    // reference edge (§6), and a terminal edge's bipartition is trivially
    // matched by the leaf bijection in every replicate.
    let mut edge_supports = Vec::with_capacity(num_edges);
    for edge in reference.edges() {
        let id = edge.id as usize;
        if edge.is_terminal() {
            continue;
        }
        let (mean_min_dist, support) = match config.algorithm {
            Algorithm::Tbe => {
                let mean = if accum.processed > 0 {
                    accum.sum_min[id] as f64 / accum.processed as f64
                } else {
                    0.0
                };
                let denom = (edge.topo_depth as f64 - 1.0).max(1.0);
                (mean, 1.0 - mean / denom)
            }
            Algorithm::Fbp => {
                let support = if accum.processed > 0 {
                    accum.hit_counts[id] as f64 / accum.processed as f64
                } else {
                    0.0
                };
                (support, support)
            }
        };
        edge_supports.push(EdgeSupport {
            edge_id: edge.id,
            topo_depth: edge.topo_depth,
            mean_min_dist,
            support,
            transfer_taxa: resolved_transfer_sets[id].clone(),
        });
    }

    let t_write = Instant::now();
    for es in &edge_supports {
        reference.edge_mut(es.edge_id).support = Some(es.support);
    }
    summary.write_secs = t_write.elapsed().as_secs_f64();

    Ok((reference, edge_supports, summary))
}

fn process_one(
    reference: &Tree,
    taxon_table: &TaxonTable,
    record: &str,
    reference_fast_ok: bool,
    algorithm: Algorithm,
) -> std::result::Result<Outcome, SkipReason> {
    let mut replicate = newick::parse(record).map_err(SkipReason::Syntax)?;
    let names: Result<Vec<&str>> = replicate
        .leaves()
        .map(|id| {
            replicate
                .node(id)
                .name
                .as_deref()
                .ok_or_else(|| TbeError::Invariant(format!("replicate leaf {id} has no name")))
        })
        .collect();
    let names = names.map_err(SkipReason::Syntax)?;
    taxon_table
        .validate_same_set(names)
        .map_err(SkipReason::TaxonMismatch)?;
    replicate
        .bind_taxa(taxon_table)
        .unwrap_or_else(|e| abort_on_invariant(e));
    replicate.seal().unwrap_or_else(|e| abort_on_invariant(e));

    match algorithm {
        Algorithm::Fbp => Ok(Outcome::Fbp {
            hit: fbp::exact_hit_mask(reference, &replicate),
        }),
        Algorithm::Tbe => {
            let mut reference_clone = reference.clone();
            let fast_capable = reference_fast_ok && replicate.is_fast_path_shape().is_ok();
            let used_naive_fallback = !fast_capable;
            if fast_capable {
                fast::compute(&mut reference_clone, &replicate);
            } else {
                if reference_fast_ok {
                    log::debug!("replicate uses non-binary shape; falling back to naive engine for this replicate");
                }
                let results = naive::transfer_distances(&reference_clone, &replicate);
                let min_dist: Vec<u32> = (0..reference_clone.num_edges())
                    .map(|id| results[id].min_transfer)
                    .collect();
                return Ok(Outcome::Tbe {
                    min_dist,
                    used_naive_fallback,
                });
            }
            let min_dist: Vec<u32> = reference_clone
                .edges()
                .iter()
                .map(|e| e.transfer_index.unwrap_or(0))
                .collect();
            Ok(Outcome::Tbe {
                min_dist,
                used_naive_fallback,
            })
        }
    }
}

fn abort_on_invariant(e: TbeError) -> ! {
    log::error!("internal invariant violated: {e}");
    std::process::exit(1);
}

fn read_replicate_records(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path).map_err(|e| TbeError::io(path.to_path_buf(), e))?;
    let reader = BufReader::new(file);
    newick::NewickRecords::new(reader)
        .map(|r| r.map_err(|e| TbeError::io(path.to_path_buf(), e)))
        .collect()
}

/// Debug aid only (`--verify-fast`); a malformed, taxon-mismatched, or
/// non-binary first replicate is skipped exactly as `process_one` would
/// skip it for the real run (§7), not treated as fatal.
fn verify_fast_against_naive(
    reference: &Tree,
    records: &[String],
    taxon_table: &TaxonTable,
) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let mut replicate = match newick::parse(first) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("--verify-fast: first replicate skipped (syntax error): {e}");
            return Ok(());
        }
    };
    let names: Result<Vec<&str>> = replicate
        .leaves()
        .map(|id| {
            replicate
                .node(id)
                .name
                .as_deref()
                .ok_or_else(|| TbeError::Invariant(format!("replicate leaf {id} has no name")))
        })
        .collect();
    let names = match names {
        Ok(n) => n,
        Err(e) => {
            log::warn!("--verify-fast: first replicate skipped (syntax error): {e}");
            return Ok(());
        }
    };
    if let Err(e) = taxon_table.validate_same_set(names) {
        log::warn!("--verify-fast: first replicate skipped (taxon mismatch): {e}");
        return Ok(());
    }
    replicate.bind_taxa(taxon_table)?;
    replicate.seal()?;
    if replicate.is_fast_path_shape().is_err() {
        log::info!(
            "--verify-fast: first replicate is not binary-shaped, nothing to compare against the naive engine"
        );
        return Ok(());
    }

    let naive_results = naive::transfer_distances(reference, &replicate);
    let mut fast_reference = reference.clone();
    fast::compute(&mut fast_reference, &replicate);

    for edge in reference.edges() {
        if edge.is_terminal() {
            continue;
        }
        let naive_dist = naive_results[edge.id as usize].min_transfer;
        let fast_dist = fast_reference.edge(edge.id).transfer_index.unwrap_or(0);
        if naive_dist != fast_dist {
            return Err(TbeError::Invariant(format!(
                "--verify-fast: edge {} naive={} fast={} disagree",
                edge.id, naive_dist, fast_dist
            )));
        }
    }
    log::info!("--verify-fast: fast and naive engines agree on the first replicate");
    Ok(())
}

/// Re-derives, for each reference edge whose minimum was realised by some
/// replicate, the names of the taxa that must be transferred. Only the
/// specific replicate records needed are re-parsed (already in memory, no
/// extra I/O).
fn resolve_transfer_sets(
    reference: &Tree,
    records: &[String],
    taxon_table: &TaxonTable,
    best: &[Option<(u32, u64)>],
) -> Result<Vec<Option<Vec<String>>>> {
    let mut out = vec![None; reference.num_edges()];
    for edge in reference.edges() {
        if edge.is_terminal() {
            continue;
        }
        let Some((min_dist, replicate_idx)) = best[edge.id as usize] else {
            continue;
        };
        if min_dist == 0 {
            out[edge.id as usize] = Some(Vec::new());
            continue;
        }
        let record = &records[replicate_idx as usize];
        let mut replicate = newick::parse(record)?;
        replicate.bind_taxa(taxon_table)?;
        replicate.seal()?;
        if let Some(rep_edge) = transfer_set::find_realising_edge(edge, &replicate, min_dist) {
            out[edge.id as usize] =
                Some(transfer_set::transfer_set_taxa(edge, rep_edge, taxon_table));
        }
    }
    Ok(out)
}

/// Writes the annotated reference tree to `output` ('-' means stdout).
pub fn write_tree(output: &str, tree: &Tree) -> Result<()> {
    let text = newick::emit(tree);
    if output == "-" {
        println!("{text}");
        return Ok(());
    }
    fs::write(output, format!("{text}\n")).map_err(|e| TbeError::io(output, e))
}

/// Writes the optional per-branch statistics TSV (§6).
pub fn write_stats(path: &Path, edges: &[EdgeSupport], transfer_set: bool) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| TbeError::io(path.to_path_buf(), e))?;
    let mut w = std::io::BufWriter::new(file);
    if transfer_set {
        writeln!(w, "edge_id\ttopological_depth\tmean_min_dist\tnormalised_support\ttransfer_taxa")
    } else {
        writeln!(w, "edge_id\ttopological_depth\tmean_min_dist\tnormalised_support")
    }
    .map_err(|e| TbeError::io(path.to_path_buf(), e))?;

    for es in edges {
        if transfer_set {
            let taxa = es
                .transfer_taxa
                .as_ref()
                .map(|t| t.join(","))
                .unwrap_or_default();
            writeln!(
                w,
                "{}\t{}\t{:.6}\t{:.6}\t{}",
                es.edge_id, es.topo_depth, es.mean_min_dist, es.support, taxa
            )
        } else {
            writeln!(
                w,
                "{}\t{}\t{:.6}\t{:.6}",
                es.edge_id, es.topo_depth, es.mean_min_dist, es.support
            )
        }
        .map_err(|e| TbeError::io(path.to_path_buf(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;

    fn write_temp(contents: &str) -> tempfile_path::TempFile {
        tempfile_path::TempFile::new(contents)
    }

    /// Minimal scratch-file helper (no external crate): writes `contents` to
    /// a uniquely named file under the OS temp dir and removes it on drop.
    mod tempfile_path {
        use std::path::PathBuf;

        pub struct TempFile {
            pub path: PathBuf,
        }

        impl TempFile {
            pub fn new(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "tbe-support-test-{}-{}",
                    std::process::id(),
                    super::unique_suffix()
                ));
                std::fs::write(&path, contents).unwrap();
                TempFile { path }
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    fn unique_suffix() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn exact_match_scenario_gives_full_support() {
        let reference_file = write_temp("((A:1,B:1):1,(C:1,D:1):1,E:1);\n");
        let replicates_file = write_temp("((A:1,B:1):1,(C:1,D:1):1,E:1);\n");

        let config = RunConfig {
            reference: reference_file.path.clone(),
            replicates: replicates_file.path.clone(),
            output: "-".to_string(),
            algorithm: Algorithm::Tbe,
            threads: 1,
            stats: None,
            quiet: true,
            force_naive: false,
            transfer_set: false,
            verify_fast: false,
        };

        let (tree, supports, summary) = run(&config).unwrap();
        assert_eq!(summary.processed, 1);
        for es in &supports {
            if tree.edge(es.edge_id).topo_depth > 1 {
                assert!((es.support - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn taxon_mismatch_replicate_is_skipped_not_fatal() {
        let reference_file = write_temp("((A:1,B:1):1,(C:1,D:1):1,E:1);\n");
        let replicates_file = write_temp(
            "((A:1,B:1):1,(C:1,D:1):1,E:1);\n((A:1,B:1):1,(C:1,F:1):1,E:1);\n",
        );

        let config = RunConfig {
            reference: reference_file.path.clone(),
            replicates: replicates_file.path.clone(),
            output: "-".to_string(),
            algorithm: Algorithm::Tbe,
            threads: 1,
            stats: None,
            quiet: true,
            force_naive: false,
            transfer_set: false,
            verify_fast: false,
        };

        let (_tree, _supports, summary) = run(&config).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped_taxon_mismatch, 1);
    }

    #[test]
    fn malformed_newick_replicate_is_skipped() {
        let reference_file = write_temp("(A:1,B:1);\n");
        let replicates_file = write_temp("(A:1,B:1);\n(A:1,B\n");

        let config = RunConfig {
            reference: reference_file.path.clone(),
            replicates: replicates_file.path.clone(),
            output: "-".to_string(),
            algorithm: Algorithm::Tbe,
            threads: 1,
            stats: None,
            quiet: true,
            force_naive: false,
            transfer_set: false,
            verify_fast: false,
        };

        let (_tree, _supports, summary) = run(&config).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped_syntax, 1);
    }
}
