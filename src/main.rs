//! Flow Sentinel - Main Entry Point
//!
//! `run`: stream detection events to stdout as JSON lines.
//! `score FILE`: batch-score a JSON Lines flow file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use flow_sentinel::constants::{EngineConfig, APP_NAME, APP_VERSION};
use flow_sentinel::logic::batch;
use flow_sentinel::{ArtifactStore, BroadcastEmitter, DetectionController};

#[derive(Debug, Parser)]
#[command(name = "flow-sentinel", version, about = "Ensemble detection engine for network flows")]
struct Cli {
    /// Artifact directory (overrides FLOW_SENTINEL_ARTIFACT_DIR)
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the real-time detection loop on synthesized flows
    Run {
        /// Pause between iterations (overrides FLOW_SENTINEL_INTERVAL_MS)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Score every flow of a JSON Lines file
    Score {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.artifacts {
        config.artifact_dir = dir;
    }

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    let store = ArtifactStore::load(&config.artifact_dir)
        .with_context(|| format!("loading artifacts from {:?}", config.artifact_dir))?;
    let store = Arc::new(store);

    match cli.command {
        Command::Run { interval_ms, duration_secs } => {
            if let Some(ms) = interval_ms.filter(|ms| *ms > 0) {
                config.interval = Duration::from_millis(ms);
            }
            run(store, &config, duration_secs.map(Duration::from_secs)).await
        }
        Command::Score { file } => score(&store, &file),
    }
}

async fn run(store: Arc<ArtifactStore>, config: &EngineConfig, duration: Option<Duration>) -> anyhow::Result<()> {
    let emitter = Arc::new(BroadcastEmitter::new(config.emitter_capacity));
    let mut events = emitter.subscribe();

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("Failed to serialize event: {}", e),
                },
                Err(RecvError::Lagged(n)) => log::warn!("Output lagging, skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let controller = Arc::new(
        DetectionController::new(store, emitter.clone(), config.interval)
            .with_dispatch_capacity(config.emitter_capacity),
    );
    controller.start();

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut health = tokio::time::interval(Duration::from_secs(1));
    let mut aborted = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupt received, shutting down");
                break;
            }
            _ = &mut deadline => {
                log::info!("Run duration elapsed");
                break;
            }
            _ = health.tick() => {
                if !controller.is_running() {
                    aborted = controller.status().last_error;
                    break;
                }
            }
        }
    }

    let status = tokio::task::spawn_blocking(move || {
        controller.stop();
        controller.status()
    })
    .await?;
    log::info!(
        "Detection finished: {} iterations, {} events, {} dropped",
        status.iterations,
        status.events_published,
        status.events_dropped
    );

    // Last sender gone: the printer drains what is buffered and exits
    drop(emitter);
    printer.await?;

    match aborted {
        Some(reason) => anyhow::bail!("detection loop aborted: {}", reason),
        None => Ok(()),
    }
}

fn score(store: &ArtifactStore, file: &Path) -> anyhow::Result<()> {
    let flows = batch::read_flows_jsonl(file)
        .with_context(|| format!("reading flows from {:?}", file))?;
    let report = batch::score_batch(&flows, store)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
