use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use lockstep::config::{DetectionConfig, WeightPolicy};
use lockstep::events::models::{parse_records, RawEvent};
use lockstep::pipeline::{parallel, Detector};

/// Lockstep: find accounts that share the same thing at the same time.
///
/// Reads (account, object, timestamp) records and reports groups of
/// accounts that repeatedly posted identical objects within a short window.
#[derive(Parser)]
#[command(name = "lockstep", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Detection options. Unset flags fall back to LOCKSTEP_* env vars, then defaults.
#[derive(clap::Args)]
struct DetectArgs {
    /// Input file: JSON Lines or a JSON array of records ("-" for stdin)
    input: PathBuf,

    /// Minimum distinct accounts per object (default: 2)
    #[arg(long)]
    min_repetition: Option<usize>,

    /// Maximum gap between two shares, in seconds (default: 10)
    #[arg(long)]
    time_window: Option<f64>,

    /// Split groups into denser communities (Louvain)
    #[arg(long)]
    refine: bool,

    /// Seed for --refine (default: 0)
    #[arg(long)]
    seed: Option<u64>,

    /// Collapse repeated shares of an object by one account to the earliest
    #[arg(long)]
    dedupe: bool,

    /// Edge weighting: "linear" or "per-object"
    #[arg(long)]
    weight_policy: Option<WeightPolicy>,

    /// Number of matcher workers (default: 4)
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect coordinated groups
    Detect {
        #[command(flatten)]
        args: DetectArgs,

        /// Print the full report as JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Rows to show in the account and object tables
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// List objects that survive repetition filtering
    Objects {
        #[command(flatten)]
        args: DetectArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lockstep=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { args, json, top } => {
            let detector = build_detector(&args)?;
            let raws = read_records(&args.input)?;
            info!(records = raws.len(), "Input loaded");

            let report = if detector.config().concurrency > 1 {
                parallel::detect_parallel(&detector, raws).await?
            } else {
                detector.detect_with_progress(raws, !json)
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            lockstep::output::terminal::display_diagnostics(&report.diagnostics);
            lockstep::output::terminal::display_groups(&report);
            lockstep::output::terminal::display_top_users(&report.statistics.users, top);
            lockstep::output::terminal::display_objects(&report.statistics.objects, top);

            if report.diagnostics.empty_input {
                println!("\n{}", "No usable events in the input.".yellow());
            }
        }

        Commands::Objects { args } => {
            let detector = build_detector(&args)?;
            let raws = read_records(&args.input)?;
            let store = detector.ingest(raws);
            let filter = detector.filter();
            let outcome = filter.apply(store.buckets());

            println!(
                "{} objects, {} filtered out",
                store.buckets().len(),
                outcome.dropped
            );
            lockstep::output::terminal::display_qualifying_objects(
                &outcome.kept,
                filter.threshold(),
            );
        }
    }

    Ok(())
}

/// Layer CLI flags over the environment configuration and validate it.
fn build_detector(args: &DetectArgs) -> Result<Detector> {
    let mut config = DetectionConfig::from_env()?;
    if let Some(n) = args.min_repetition {
        config.min_repetition = n;
    }
    if let Some(window) = args.time_window {
        config.time_window_secs = window;
    }
    if args.refine {
        config.refine = true;
    }
    if args.seed.is_some() {
        config.refine_seed = args.seed;
    }
    if args.dedupe {
        config.dedupe_self_repeats = true;
    }
    if let Some(policy) = args.weight_policy {
        config.weight_policy = policy;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }

    let detector = Detector::new(config)?;
    let config = detector.config();
    info!(
        min_repetition = config.min_repetition,
        time_window_secs = config.time_window_secs,
        refine = config.refine,
        seed = config.refine.then(|| config.effective_seed()),
        weight_policy = %config.weight_policy,
        "Configuration loaded"
    );
    Ok(detector)
}

/// Read raw records from a JSON array or JSON Lines file.
fn read_records(path: &PathBuf) -> Result<Vec<RawEvent>> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read records from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?
    };

    parse_records(&text)
        .with_context(|| format!("{} is not a valid JSON array of records", path.display()))
}
