//! Status and health check handlers
//!
//! - `/status` - export counters, failure breakdown, latency, memory
//! - `/health` - simple liveness check
//! - `/ready` - readiness check
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "pagepress",
//!   "uptime_seconds": 3600,
//!   "delivery_mode": "attachment",
//!   "exports_succeeded": 1020,
//!   "exports_failed": 4,
//!   "failures": { "navigation_timeout": 3, "invalid_request": 1 },
//!   "memory": { "rss_bytes": 52428800, "virtual_bytes": 268435456 },
//!   "latency": { "p50_ms": 812.0, "p95_ms": 2210.5, "p99_ms": 4980.2, ... },
//!   "status": "running",
//!   "timestamp": "2026-01-01T12:00:00Z"
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument};

use super::ServiceState;
use crate::delivery::DeliveryMode;
use crate::error::ErrorKind;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Upper bound tracked by the latency histogram (10 minutes, in microseconds)
const MAX_TRACKED_LATENCY_US: u64 = 600_000_000;

// ============================================================================
// Response Types
// ============================================================================

/// Health check response for simple liveness checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (always "healthy" if responding)
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Detailed server status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,

    /// Server name
    pub name: String,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Configured delivery mode
    pub delivery_mode: DeliveryMode,

    /// Exports that produced a delivered PDF
    pub exports_succeeded: u64,

    /// Exports that failed for any reason
    pub exports_failed: u64,

    /// Failures broken down by error kind
    pub failures: BTreeMap<String, u64>,

    /// Memory usage metrics
    pub memory: MemoryMetrics,

    /// Export latency statistics (percentiles)
    pub latency: LatencyMetrics,

    /// Server status (always "running" if responding)
    pub status: String,

    /// RFC 3339 timestamp of when status was generated
    pub timestamp: String,
}

/// Memory usage metrics collected from sysinfo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    /// Resident Set Size (bytes)
    pub rss_bytes: u64,

    /// Virtual memory size (bytes)
    pub virtual_bytes: u64,
}

/// Export latency percentile metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// 50th percentile (median) latency in milliseconds
    pub p50_ms: f64,

    /// 95th percentile latency in milliseconds
    pub p95_ms: f64,

    /// 99th percentile latency in milliseconds
    pub p99_ms: f64,

    /// Number of exports recorded
    pub total_requests: u64,

    /// Mean latency in milliseconds
    pub mean_ms: f64,

    /// Maximum latency recorded in milliseconds
    pub max_ms: f64,
}

// ============================================================================
// Latency Histogram
// ============================================================================

/// Thread-safe latency histogram.
///
/// Tracks 1 microsecond to 10 minutes with 3 significant figures; browser
/// exports are slow, so the upper bound is far above the usual HTTP range.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Histogram<u64>>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_LATENCY_US, 3)
            .expect("Failed to create histogram");
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a latency duration. Values out of range are clamped.
    pub fn record(&self, duration: Duration) {
        let us = (duration.as_micros() as u64).clamp(1, MAX_TRACKED_LATENCY_US);
        let _ = self.inner.write().record(us);
    }

    /// Number of recorded values.
    pub fn count(&self) -> u64 {
        self.inner.read().len()
    }

    /// Percentiles converted to milliseconds.
    pub fn metrics(&self) -> LatencyMetrics {
        let hist = self.inner.read();
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: hist.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: hist.value_at_percentile(99.0) as f64 / 1000.0,
            total_requests: hist.len(),
            mean_ms: hist.mean() / 1000.0,
            max_ms: hist.max() as f64 / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Export Metrics
// ============================================================================

/// Process-wide export counters.
///
/// Observability only; nothing here influences how a request is handled.
#[derive(Debug)]
pub struct ExportMetrics {
    start_time: Instant,
    succeeded: AtomicU64,
    failures: [AtomicU64; ErrorKind::ALL.len()],
    latency: LatencyHistogram,
}

impl ExportMetrics {
    /// Fresh counters starting now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            succeeded: AtomicU64::new(0),
            failures: std::array::from_fn(|_| AtomicU64::new(0)),
            latency: LatencyHistogram::new(),
        }
    }

    /// Server uptime in seconds.
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Count a delivered export and return the new total.
    #[inline]
    pub fn record_success(&self) -> u64 {
        self.succeeded.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a failed export of `kind` and return the new total for that kind.
    #[inline]
    pub fn record_failure(&self, kind: ErrorKind) -> u64 {
        self.failures[Self::index(kind)].fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record how long one export took.
    #[inline]
    pub fn record_latency(&self, duration: Duration) {
        self.latency.record(duration);
    }

    /// Delivered exports.
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Failures of one kind.
    pub fn failures_of(&self, kind: ErrorKind) -> u64 {
        self.failures[Self::index(kind)].load(Ordering::Relaxed)
    }

    /// All failures.
    pub fn failed(&self) -> u64 {
        self.failures.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Non-zero failure counts keyed by kind name.
    pub fn failure_breakdown(&self) -> BTreeMap<String, u64> {
        ErrorKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.failures_of(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Latency percentiles.
    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency.metrics()
    }

    fn index(kind: ErrorKind) -> usize {
        ErrorKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(ErrorKind::ALL.len() - 1)
    }
}

impl Default for ExportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// System Metrics Collection
// ============================================================================

/// Memory metrics for the current process; zeros if it cannot be found.
fn collect_memory_metrics() -> MemoryMetrics {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match system.process(pid) {
        Some(process) => MemoryMetrics {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        },
        None => {
            debug!("Could not find current process in sysinfo");
            MemoryMetrics::default()
        }
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let metrics = &state.metrics;
    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: metrics.uptime_seconds(),
        delivery_mode: state.exporter.delivery_mode(),
        exports_succeeded: metrics.succeeded(),
        exports_failed: metrics.failed(),
        failures: metrics.failure_breakdown(),
        memory: collect_memory_metrics(),
        latency: metrics.latency_metrics(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

/// `GET /ready`
///
/// Every export launches its own browser, so there is nothing to warm up.
#[instrument(skip_all)]
pub async fn readiness_handler() -> impl IntoResponse {
    debug!("Readiness check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

// ============================================================================
// Tests
// ============================================================================
