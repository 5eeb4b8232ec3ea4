//! re:collect Server Binary
//!
//! Runs the interaction API and the queue worker in one process.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use recollect_core::{
    InMemoryInteractionRecords, InMemoryQueue, InMemoryUserGraph, InteractionProcessor,
    InteractionPublisher, InteractionQueue, InteractionRecords, SqliteInteractionRecords,
};
use recollect_flags::{FileFlagSource, Features, InMemoryFlagSource};
use recollect_server::{serve, worker::{spawn_flag_reloader, spawn_worker}, AppState, ServerConfig, StaticTokenAuthenticator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server_config = ServerConfig::from_env();
    let config = server_config.pipeline_config()?;

    let flag_file = match &server_config.flags_path {
        Some(path) => {
            let source = Arc::new(FileFlagSource::open(path)?);
            tracing::info!("Loaded feature flags from {}", path.display());
            Some(source)
        }
        None => None,
    };
    let features = match &flag_file {
        Some(source) => Features::new(source.clone()),
        None => Features::new(Arc::new(InMemoryFlagSource::new())),
    };

    let records: Arc<dyn InteractionRecords> = match &config.storage.database_path {
        Some(path) => {
            tracing::info!("Storing interaction records in {}", path.display());
            Arc::new(SqliteInteractionRecords::new(path)?)
        }
        None => Arc::new(InMemoryInteractionRecords::new()),
    };
    let graph = Arc::new(InMemoryUserGraph::new());
    let processor = Arc::new(InteractionProcessor::new(graph, records, &config.processor));

    let queue: InteractionQueue = Arc::new(
        InMemoryQueue::new(config.queue.name.clone(), config.queue.visibility_timeout())
            .with_max_receive_count(config.queue.max_receive_count),
    );
    let publisher = InteractionPublisher::new(queue.clone(), config.publisher.timeout());

    let authenticator = StaticTokenAuthenticator::new(server_config.token_table()?);
    if authenticator.is_empty() {
        tracing::warn!("No API tokens configured; every API request will be rejected");
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = spawn_worker(queue, processor, features.clone(), &config.worker, stop_rx.clone());
    let reloader = flag_file.map(|source| spawn_flag_reloader(source, config.flags.reload_interval(), stop_rx));

    let addr = server_config.addr.clone();
    let state = Arc::new(AppState::new(
        publisher,
        features,
        Arc::new(authenticator),
        server_config,
    ));

    serve(&addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down");
    })
    .await?;

    let _ = stop_tx.send(true);
    worker.await??;
    if let Some(reloader) = reloader {
        reloader.await??;
    }
    Ok(())
}
