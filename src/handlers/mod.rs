//! HTTP handlers
//!
//! ```text
//! POST /api/generate-pdf   export (also served at /)
//! GET  /health             liveness
//! GET  /ready              readiness
//! GET  /status             counters, latency, memory
//! ```

pub mod export;
pub mod status;

pub use export::{error_response, export_handler, method_not_allowed, ErrorBody};
pub use status::{
    health_handler, readiness_handler, status_handler, ExportMetrics, HealthResponse,
    LatencyHistogram, LatencyMetrics, MemoryMetrics, StatusResponse,
};

use crate::export::Exporter;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Path of the export endpoint
pub const EXPORT_PATH: &str = "/api/generate-pdf";

/// Shared state behind every handler
pub struct ServiceState {
    /// Export pipeline
    pub exporter: Exporter,
    /// Process-wide counters
    pub metrics: ExportMetrics,
}

impl ServiceState {
    /// State with fresh counters
    pub fn new(exporter: Exporter) -> Self {
        Self {
            exporter,
            metrics: ExportMetrics::new(),
        }
    }
}

/// Application router without transport layers (tracing, CORS)
pub fn router(state: Arc<ServiceState>) -> Router {
    let export = post(export_handler).fallback(method_not_allowed);

    Router::new()
        .route(EXPORT_PATH, export.clone())
        .route("/", export)
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}
