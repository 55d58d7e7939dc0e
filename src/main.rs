use clap::Parser;

use tbe_support::config::{Args, RunConfig};
use tbe_support::orchestrator::{self, RunSummary};
use tbe_support::TbeError;

fn main() {
    let args = Args::parse();
    let config = match RunConfig::from_args(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("usage error: {e}");
            std::process::exit(2);
        }
    };

    let default_level = if config.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match orchestrator::run(&config) {
        Ok((tree, edge_supports, summary)) => {
            log_summary(&summary);
            if let Err(e) = orchestrator::write_tree(&config.output, &tree) {
                eprintln!("failed to write output tree: {e}");
                std::process::exit(1);
            }
            if let Some(stats_path) = &config.stats {
                if let Err(e) =
                    orchestrator::write_stats(stats_path, &edge_supports, config.transfer_set)
                {
                    eprintln!("failed to write stats file: {e}");
                    std::process::exit(1);
                }
            }
            std::process::exit(0);
        }
        Err(e) => {
            let code = e.exit_code();
            report_fatal(&e);
            std::process::exit(code);
        }
    }
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "read {:.3}s, compute {:.3}s, write {:.3}s",
        summary.read_secs,
        summary.compute_secs,
        summary.write_secs
    );
    log::info!(
        "{} replicates processed, {} skipped (syntax), {} skipped (taxon mismatch), {} fast-path fallbacks",
        summary.processed,
        summary.skipped_syntax,
        summary.skipped_taxon_mismatch,
        summary.fast_path_fallbacks,
    );
}

fn report_fatal(e: &TbeError) {
    log::error!("fatal: {e}");
    eprintln!("fatal: {e}");
}
