use anyhow::{Context, Result};
use clap::Parser;
use loqa_ingest::{
    create_router, AppState, CompletionEmitter, CompletionWorker, Config, NatsClient, Reaper,
    SessionRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-ingest", about = "Real-time audio ingest service")]
struct Args {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/loqa-ingest")]
    config: String,

    /// Override storage.recordings_path
    #[arg(long)]
    recordings_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(path) = args.recordings_path {
        cfg.storage.recordings_path = path;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings: {}", cfg.storage.recordings_path.display());

    let nats = NatsClient::connect(&cfg.nats.url).await?;

    let (emitter, completions) = CompletionEmitter::channel();
    let registry = Arc::new(SessionRegistry::new(cfg.storage.clone(), emitter));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = tokio::spawn(
        CompletionWorker::new(completions, nats, cfg.nats.completion_subject.clone())
            .run(shutdown_rx.clone()),
    );
    let reaper = tokio::spawn(Reaper::new(Arc::clone(&registry), &cfg.reaper).run(shutdown_rx));

    let app = create_router(AppState::new(Arc::clone(&registry)));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");

    // Upgraded sockets outlive the server; refuse their new recordings
    registry.shutdown().await;
    shutdown_tx.send(true).ok();

    if let Err(e) = reaper.await {
        error!("Reaper task panicked: {}", e);
    }
    match worker.await {
        Ok((tally, nats)) => {
            info!(
                "Completion events: {} delivered, {} failed",
                tally.delivered, tally.failed
            );
            if let Err(e) = nats.close().await {
                error!("Failed to close NATS connection: {:#}", e);
            }
        }
        Err(e) => error!("Completion worker panicked: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
