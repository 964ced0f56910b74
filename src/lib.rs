//! Pagepress - Web Page to PDF Export Service
//!
//! Renders a caller-supplied URL in headless Chromium, optionally hides
//! elements matching CSS selectors, prints the page to an A4 PDF and hands
//! the result back as a download, an inline base64 data URI, or the URL of an
//! uploaded copy.
//!
//! # Architecture
//!
//! ```text
//! POST /api/generate-pdf ──▶ Exporter ──▶ BrowserEngine (CDP)
//!                               │               │
//!                               │     filter ─▶ goto ─▶ redact ─▶ pdf
//!                               ▼
//!                        DeliveryStrategy
//!                 ┌─────────────┼──────────────┐
//!                 ▼             ▼              ▼
//!            attachment    data: URI      ObjectStore
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pagepress::browser::BrowserConfig;
//! use pagepress::engine::ChromiumEngine;
//! use pagepress::delivery::DeliveryStrategy;
//! use pagepress::export::{ExportRequest, ExportSettings, Exporter};
//! use pagepress::browser::{NavigationOptions, RedactionPolicy, RenderOptions, ResourceFilter, WaitUntil};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(ChromiumEngine::new(BrowserConfig::default()));
//!     let settings = ExportSettings {
//!         navigation: NavigationOptions::new(WaitUntil::DomContentLoaded, 10_000),
//!         render: RenderOptions::a4(30_000),
//!         filter: ResourceFilter::default(),
//!         redaction: RedactionPolicy::Strict,
//!     };
//!     let exporter = Exporter::new(engine, settings, DeliveryStrategy::Attachment);
//!
//!     let request = ExportRequest::new("https://example.com").with_exclude_selectors([".ads"]);
//!     let delivered = exporter.export(&request).await?;
//!     println!("Delivered as {}", delivered.mode());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod cors;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod export;
pub mod handlers;

// Re-exports for convenience
pub use browser::BrowserController;
pub use config::{ServiceArgs, ServiceConfig};
pub use delivery::{Delivered, DeliveryMode, DeliveryStrategy};
pub use engine::{BrowserEngine, ChromiumEngine, EngineSession};
pub use error::{Error, ErrorKind, Result};
pub use export::{ExportRequest, ExportSettings, Exporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
