//! Pagepress HTTP server
//!
//! Exposes `POST /api/generate-pdf` plus health and status endpoints.

use anyhow::Context;
use clap::Parser;
use pagepress::config::{ServiceArgs, ServiceConfig};
use pagepress::cors::cors_layer;
use pagepress::delivery::{DeliveryStrategy, HttpObjectStore};
use pagepress::engine::ChromiumEngine;
use pagepress::export::Exporter;
use pagepress::handlers::{self, ServiceState, EXPORT_PATH};
use pagepress::DeliveryMode;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServiceArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServiceConfig::from_args(args).context("invalid configuration")?;

    let delivery = match (config.delivery.mode, config.delivery.upload.clone()) {
        (DeliveryMode::Attachment, _) => DeliveryStrategy::Attachment,
        (DeliveryMode::InlineBase64, _) => DeliveryStrategy::InlineBase64,
        (DeliveryMode::UploadedUrl, Some(upload)) => {
            tracing::info!("Uploading exports to {}", upload.endpoint);
            DeliveryStrategy::upload(Arc::new(HttpObjectStore::new(upload)?))
        }
        (DeliveryMode::UploadedUrl, None) => {
            anyhow::bail!("uploaded-url delivery selected without upload settings")
        }
    };

    let engine = Arc::new(ChromiumEngine::new(config.browser.clone()));
    let exporter = Exporter::new(engine, config.export.clone(), delivery);
    let state = Arc::new(ServiceState::new(exporter));

    let mut app = handlers::router(state).layer(TraceLayer::new_for_http());
    if let Some(cors) = cors_layer(&config.cors_origins) {
        tracing::info!("CORS enabled for {:?}", config.cors_origins);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        "Pagepress listening on http://{}{} (delivery: {})",
        config.bind_addr,
        EXPORT_PATH,
        config.delivery.mode
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Pagepress stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C - shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM - shutting down"),
    }
}
