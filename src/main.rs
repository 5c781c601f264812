//! Sentiflow - Main Entry Point
//!
//! Runs the streaming sentiment pipeline from the command line and prints the
//! live aggregate while it runs.

use anyhow::Context;
use clap::Parser;
use sentiflow::{
    config::{default_config_path, PipelineConfig, QueueConfig},
    pipeline::{AggregateSnapshot, PipelineBuilder, PipelineReport, SelectionPolicy, VecProvider},
    scripting::{builtins, ScriptFilter},
    types::RawRecord,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when no records file is given
const DEMO_RECORDS: &[&str] = &[
    "This video is amazing, thanks for sharing!",
    "Worst tutorial I have ever watched",
    "Can you do one about async Rust next?",
    "I love how clear the explanations are",
    "The audio is really bad in the second half",
    "First time watching this channel",
    "Not bad at all, pretty useful actually",
    "This is a waste of time",
    "Great editing and a wonderful soundtrack",
    "Uploaded on a Tuesday",
    "I don't like the new intro",
    "Best explanation on the whole platform",
];

#[derive(Parser, Debug)]
#[command(
    name = "sentiflow",
    version,
    about = "Streaming sentiment pipeline with a live EMA score",
    long_about = "Samples text records, classifies their sentiment on a worker thread and\n\
                  keeps an exponential moving average of the sentiment score.\n\
                  Settings come from --config, or pipeline.toml in the user config directory."
)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, env = "SENTIFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Records file: a CSV dataset with a header row, or one plain-text or JSON record per line
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Records to enqueue before closing the stream
    #[arg(long)]
    max_items: Option<u64>,

    /// Minimum delay between records, in seconds
    #[arg(long)]
    min_delay: Option<f64>,

    /// Maximum delay between records, in seconds
    #[arg(long)]
    max_delay: Option<f64>,

    /// EMA smoothing factor in (0, 1]
    #[arg(long)]
    alpha: Option<f64>,

    /// Number of recent records kept in the aggregate
    #[arg(long)]
    window: Option<usize>,

    /// Capacity of both queues
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Source filter: a built-in name (english, non-empty, no-links) or a Rhai expression
    #[arg(long)]
    filter: Option<String>,

    /// Emit records in file order instead of sampling at random
    #[arg(long)]
    sequential: bool,

    /// Seed for record selection and pacing
    #[arg(long)]
    seed: Option<u64>,

    /// Interval between live snapshots, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    /// Print snapshots and the final report as JSON lines
    #[arg(long)]
    json: bool,

    /// Also write logs to a daily rotating file in this directory
    #[arg(long, env = "SENTIFLOW_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref())?;

    tracing::info!("Starting sentiflow");

    let config = load_config(&cli)?;
    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save config to {:?}", path))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let policy = if cli.sequential {
        SelectionPolicy::Sequential
    } else {
        SelectionPolicy::Random
    };
    let mut provider = match &cli.records {
        Some(path) => VecProvider::from_path(path, policy)
            .with_context(|| format!("Failed to load records from {:?}", path))?,
        None => {
            tracing::info!("No records file given, using {} demo records", DEMO_RECORDS.len());
            VecProvider::new(DEMO_RECORDS.iter().map(|t| RawRecord::new(*t)).collect(), policy)
        }
    };
    if let Some(seed) = cli.seed {
        provider = provider.with_seed(seed);
    }

    let mut builder = PipelineBuilder::new(config).provider(provider);
    if let Some(filter) = &cli.filter {
        let source = builtins::by_name(filter).unwrap_or(filter.as_str());
        let script = ScriptFilter::compile(source)
            .with_context(|| format!("Invalid filter {:?}", filter))?;
        tracing::info!("Using source filter: {}", script.source());
        builder = builder.filter(script);
    }

    let running = builder.build()?.start()?;
    let stop = running.stop_handle();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, draining pipeline...");
        stop.request_stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let aggregate = running.aggregate();
    let poll = Duration::from_millis(cli.poll_ms.max(10));

    while !running.is_finished() {
        std::thread::sleep(poll);
        print_snapshot(&aggregate.snapshot(), cli.json)?;
    }

    let report = running.join()?;
    print_report(&report, cli.json)?;

    tracing::info!("Shutting down...");
    Ok(())
}

fn init_logging(verbose: u8, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = match verbose {
        0 => "info",
        1 => "info,sentiflow=debug",
        _ => "debug,sentiflow=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "sentiflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Config file (explicit or default location) with command line overrides on top.
fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            if let Some(path) = default_config_path() {
                tracing::debug!("Looking for config at {:?}", path);
            }
            PipelineConfig::load_or_default()
        }
    };

    if let Some(max_items) = cli.max_items {
        config.source.max_items = max_items;
    }
    if let Some(min_delay) = cli.min_delay {
        config.source.min_delay_secs = min_delay;
    }
    if let Some(max_delay) = cli.max_delay {
        config.source.max_delay_secs = max_delay;
    }
    if cli.seed.is_some() {
        config.source.seed = cli.seed;
    }
    if let Some(alpha) = cli.alpha {
        config.aggregator.alpha = alpha;
    }
    if let Some(window) = cli.window {
        config.aggregator.recent_window = window;
    }
    if let Some(capacity) = cli.queue_capacity {
        config.queues = QueueConfig::uniform(capacity);
    }

    config.validate()?;
    Ok(config)
}

fn print_snapshot(snapshot: &AggregateSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let ema = snapshot
        .ema_score
        .map(|s| format!("{:5.1}", s))
        .unwrap_or_else(|| "  n/a".to_string());
    let counts = &snapshot.sentiment_counts;
    let latest = snapshot
        .recent_comments
        .last()
        .map(|entry| format!("[{}] {}", entry.label, entry.text))
        .unwrap_or_default();

    println!(
        "{} | processed {:>4} | EMA {} | POS {:>3} NEU {:>3} NEG {:>3} | {}",
        snapshot.taken_at.format("%H:%M:%S"),
        snapshot.total_processed,
        ema,
        counts.pos,
        counts.neu,
        counts.neg,
        latest
    );
    Ok(())
}

fn print_report(report: &PipelineReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!();
    println!("Pipeline finished");
    for stage in [&report.source, &report.classifier, &report.aggregator] {
        println!(
            "  {:<10} processed {:>5}  dropped {:>4}  skipped {:>4}  failures {:>4}  ({:?})",
            stage.stage.to_string(),
            stage.processed,
            stage.dropped,
            stage.skipped,
            stage.failures,
            stage.completion
        );
    }
    match report.snapshot.ema_score {
        Some(ema) => println!("  final EMA score: {:.2}", ema),
        None => println!("  no records were aggregated"),
    }
    for entry in &report.snapshot.recent_comments {
        println!("    {:>5.1} [{}] {}", entry.score, entry.label, entry.text);
    }
    Ok(())
}
