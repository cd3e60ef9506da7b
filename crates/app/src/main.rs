mod config;
mod http;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use config::Cli;
use pdf_rag_core::{LopdfExtractor, RagService, RemoteBackends};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    cli.ensure_upload_dir()?;

    let backends = RemoteBackends::new(cli.backend_config()?)
        .context("failed to build http client")?;
    if backends.config().embedding_endpoint.is_none() {
        warn!("no embedding endpoint configured; only ngram-hash embedding models are usable");
    }

    let service = RagService::new(
        cli.service_config()?,
        Arc::new(backends),
        Arc::new(LopdfExtractor),
    )
    .context("invalid service configuration")?;

    let app = http::router(Arc::new(service), cli.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("cannot bind {}", cli.bind))?;

    info!(
        version = app_version,
        bind = %cli.bind,
        upload_dir = %cli.upload_dir.display(),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag-server boot"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("pdf-rag-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
