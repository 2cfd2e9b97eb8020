//! bottomlab CLI.
//!
//! `bottomlab scan --config engine.toml --universe universe.toml` runs the
//! full pipeline and prints the text report. Exit codes: 0 ok, 1 config
//! error, 2 empty universe, 3 cancelled, 4 internal error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use bottomlab_runner::cache::IndicatorCache;
use bottomlab_runner::config::EngineConfig;
use bottomlab_runner::pipeline::Pipeline;
use bottomlab_runner::report;
use bottomlab_runner::snapshot::{RunLog, RunSnapshot};
use bottomlab_runner::source::{CsvPriceSource, PriceSource, SyntheticPriceSource};
use bottomlab_runner::universe::Universe;

const EXIT_CONFIG: u8 = 1;
const EXIT_EMPTY_UNIVERSE: u8 = 2;
const EXIT_CANCELLED: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

#[derive(Parser)]
#[command(name = "bottomlab")]
#[command(about = "Statistical position-trading signal engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the universe and rank trade candidates
    Scan {
        /// Engine configuration TOML
        #[arg(short, long, default_value = "engine.toml")]
        config: PathBuf,

        /// Instrument universe TOML
        #[arg(short, long, default_value = "universe.toml")]
        universe: PathBuf,

        /// Directory of per-ticker CSV price files; omit to use the
        /// deterministic synthetic source (fixtures/smoke runs)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// As-of date (default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Run-log directory for snapshots and history
        #[arg(long, default_value = "runs")]
        out: PathBuf,

        /// Directory for the persistent indicator cache (off when omitted)
        #[arg(long)]
        indicator_cache: Option<PathBuf>,

        /// Also write the setups table as CSV next to the snapshot
        #[arg(long)]
        csv: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan { config, universe, data_dir, as_of, out, indicator_cache, csv } => {
            run_scan(config, universe, data_dir, as_of, out, indicator_cache, csv)
        }
    }
}

fn run_scan(
    config_path: PathBuf,
    universe_path: PathBuf,
    data_dir: Option<PathBuf>,
    as_of: Option<NaiveDate>,
    out: PathBuf,
    indicator_cache: Option<PathBuf>,
    write_csv: bool,
) -> ExitCode {
    let config = match EngineConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let universe = match Universe::from_file(&universe_path) {
        Ok(universe) => universe,
        Err(e) => {
            error!("universe: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if universe.is_empty() {
        error!("universe file lists no instruments");
        return ExitCode::from(EXIT_EMPTY_UNIVERSE);
    }

    let source: Box<dyn PriceSource> = match data_dir {
        Some(dir) => Box::new(CsvPriceSource::new(dir)),
        None => {
            info!("no --data-dir given; using the deterministic synthetic source");
            Box::new(SyntheticPriceSource::new(config.master_seed))
        }
    };

    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let cancel = Arc::new(AtomicBool::new(false));

    let cache = match indicator_cache {
        Some(dir) => match IndicatorCache::new(dir) {
            Ok(cache) => Some(cache),
            Err(e) => {
                error!("indicator cache: {e}");
                return ExitCode::from(EXIT_INTERNAL);
            }
        },
        None => None,
    };

    let mut pipeline = Pipeline::new(&config, &universe, as_of);
    if let Some(cache) = &cache {
        pipeline = pipeline.with_indicator_cache(cache);
    }
    let outcome = match pipeline.run(source.as_ref(), &cancel) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("pipeline: {e}");
            return ExitCode::from(EXIT_INTERNAL);
        }
    };

    let snapshot = RunSnapshot::new(&outcome, config.digest(), universe.digest(), Utc::now());
    print!("{}", report::render_text(&snapshot, &outcome));

    match RunLog::new(&out).and_then(|log| log.persist(&snapshot)) {
        Ok(path) => {
            info!("snapshot written to {}", path.display());
            if write_csv {
                let csv_path = path.with_extension("csv");
                match report::render_csv(&snapshot)
                    .and_then(|csv| Ok(std::fs::write(&csv_path, csv)?))
                {
                    Ok(()) => info!("setups CSV written to {}", csv_path.display()),
                    Err(e) => {
                        error!("csv export: {e}");
                        return ExitCode::from(EXIT_INTERNAL);
                    }
                }
            }
        }
        Err(e) => {
            error!("snapshot: {e}");
            return ExitCode::from(EXIT_INTERNAL);
        }
    }

    if outcome.partial {
        info!("run was cancelled before completing the universe");
        return ExitCode::from(EXIT_CANCELLED);
    }
    ExitCode::SUCCESS
}
