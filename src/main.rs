use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traintrack::engine::{EngineConfig, Notifier, TrackingEngine};
use traintrack::tail::{TailConfig, Tailer};
use traintrack::types::Report;

#[derive(Parser, Debug)]
#[command(name = "traintrack")]
#[command(about = "Monitor a train movement log and reconstruct route state")]
struct Args {
    /// Path to the live log file to tail
    live: PathBuf,

    /// Optional history journal enabling resumable restarts
    history: Option<PathBuf>,
}

/// Surfaces severe delays in the log output. A desktop notification
/// transport can replace this without touching the engine.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, report: &Report) {
        tracing::warn!(
            train = %report.train,
            location = %report.location,
            delay_secs = report.delay_secs,
            "severe delay"
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traintrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut engine = TrackingEngine::new(EngineConfig::default());
    let mut notifier = LogNotifier;
    let tailer = Tailer::open(
        &args.live,
        args.history.as_deref(),
        TailConfig::from_env(),
        &mut engine,
    )?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            return;
        }
        trigger.cancel();
    });

    tailer.run(&mut engine, &mut notifier, shutdown).await?;

    let counters = engine.counters();
    tracing::info!(
        lines = counters.lines,
        arrivals = counters.arrivals,
        routes_closed = counters.routes_closed,
        "tailer stopped"
    );
    Ok(())
}
