// src/main.rs
//! Reaction Recorder
//!
//! Reads the contest feed and drives team recordings until the feed ends or
//! the process is interrupted. A finished feed waits for pending stops.

use anyhow::Result;
use reaction_recorder::agent::GrabberProvider;
use reaction_recorder::contest::feed;
use reaction_recorder::observability::{init_metrics, init_tracing};
use reaction_recorder::recording::{
    AuditLog, CommandDispatcher, Recorder, RecordStorage, RecordingEngine, SystemClock,
};
use reaction_recorder::utils::config::AppConfig;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    init_tracing(&config.observability)?;
    init_metrics(&config.observability)?;

    info!("Starting Reaction Recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {:?}", config);

    let storage = Arc::new(RecordStorage::open(config.storage.clone()).await?);
    let audit = AuditLog::open(config.audit.clone()).await?;
    let dispatcher = CommandDispatcher::new(Arc::new(GrabberProvider::new(config.agent.clone())));

    let engine = RecordingEngine::new(
        storage,
        dispatcher,
        Arc::new(SystemClock),
        config.timings.clone(),
    )
    .with_audit_log(audit);
    let mut recorder = Recorder::new(engine);

    let updates = feed::open(&config.feed).await?;

    let outcome = tokio::select! {
        result = recorder.run(updates) => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
    };

    let dispatcher = recorder.engine().dispatcher();
    match outcome {
        Some(Ok(stats)) => {
            info!("Recorder stopped: {:?}", stats);
            tokio::select! {
                _ = dispatcher.drain() => info!("All agent commands finished"),
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Received shutdown signal, dropping {} pending agent commands", dispatcher.pending());
                }
            }
            Ok(())
        }
        Some(Err(e)) => {
            error!("Recorder failed: {}", e);
            Err(e.into())
        }
        None => {
            info!(
                "Received shutdown signal, dropping {} pending agent commands",
                dispatcher.pending()
            );
            Ok(())
        }
    }
}
