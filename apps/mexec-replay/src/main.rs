mod sim;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mexec_events::{EventSink, FanOut, JsonLinesSink, LogSink, SummaryLogger};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::sim::Scenario;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mexec-replay")]
#[command(about = "Replay a simulated marketplace computation through the executor event sinks")]
struct Cli {
    /// Number of providers to negotiate with.
    #[arg(long, default_value_t = 3)]
    providers: usize,
    /// Number of tasks to distribute across providers.
    #[arg(long, default_value_t = 9)]
    tasks: usize,
    /// Make the worker of this provider (0-based) crash mid-run.
    #[arg(long)]
    fail_provider: Option<usize>,
    #[arg(long, default_value = "public")]
    subnet_tag: String,
    /// Also write every event as a JSON line to this file.
    #[arg(long)]
    records: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
    /// Filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_filter: String,
    #[arg(long, default_value_t = 256)]
    channel_capacity: usize,
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_filter));
    match cli.log_format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let summary = Arc::new(SummaryLogger::new());
    let mut sinks = FanOut::new().with(Arc::new(LogSink)).with(summary.clone());
    if let Some(path) = &cli.records {
        let records = JsonLinesSink::create(path)
            .with_context(|| format!("failed to create records file {path:?}"))?;
        sinks.push(Arc::new(records));
        info!(path = %path.display(), "writing event records");
    }

    let (tx, mut rx) = mpsc::channel(cli.channel_capacity);
    let consumer = tokio::spawn(async move {
        let mut seen = 0u64;
        while let Some(event) = rx.recv().await {
            seen += 1;
            if let Err(error) = sinks.emit(&event) {
                warn!(event = event.name(), %error, "failed to deliver event");
            }
        }
        seen
    });

    let scenario = Scenario {
        providers: cli.providers,
        tasks: cli.tasks,
        fail_provider: cli.fail_provider,
        subnet_tag: cli.subnet_tag.clone(),
    };
    sim::run(scenario, tx).await?;

    let seen = consumer.await?;
    let summary = summary.summary();
    let rendered = serde_json::to_string(&summary).context("failed serializing summary")?;
    info!(events = seen, summary = %rendered, "replay complete");

    Ok(())
}
