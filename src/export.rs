//! URL-to-PDF export pipeline
//!
//! # Architecture
//!
//! ```text
//! ExportRequest ──▶ validate ──▶ BrowserEngine::launch
//!                                      │
//!                     set_request_filter ─▶ goto ─▶ hide_elements? ─▶ pdf
//!                                      │
//!                          EngineSession::close (every exit path)
//!                                      │
//!                                      ▼
//!                           DeliveryStrategy::deliver
//! ```

use crate::browser::{NavigationOptions, RedactionPolicy, RedactionReport, RenderOptions, ResourceFilter};
use crate::delivery::{Delivered, DeliveryMode, DeliveryStrategy};
use crate::engine::{release, BrowserEngine, EngineSession};
use crate::error::{RequestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn, Instrument};
use url::Url;

/// Longest URL accepted
pub const MAX_URL_LENGTH: usize = 2048;

/// A single export job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Absolute http(s) or file URL of the page
    pub url: String,
    /// CSS selectors whose matches are hidden before capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_selectors: Option<Vec<String>>,
}

/// Loose shape of an incoming body, checked field by field
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExportRequest {
    #[serde(default)]
    url: Option<Value>,
    #[serde(default)]
    exclude_selectors: Option<Value>,
}

impl ExportRequest {
    /// Request for `url` without redaction; surrounding whitespace is dropped
    pub fn new<S: Into<String>>(url: S) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim().to_string(),
            exclude_selectors: None,
        }
    }

    /// Add selectors to hide
    pub fn with_exclude_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_selectors = Some(selectors.into_iter().map(Into::into).collect());
        self
    }

    /// Parse and validate a JSON request body
    pub fn from_json(body: &[u8]) -> std::result::Result<Self, RequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestError::MissingUrl);
        }

        let raw: RawExportRequest = serde_json::from_slice(body)
            .map_err(|e| RequestError::MalformedBody(e.to_string()))?;

        let url = match raw.url {
            None | Some(Value::Null) => return Err(RequestError::MissingUrl),
            Some(Value::String(s)) if s.trim().is_empty() => return Err(RequestError::MissingUrl),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(RequestError::InvalidUrl(format!(
                    "expected a string, got {}",
                    other
                )))
            }
        };

        let exclude_selectors = match raw.exclude_selectors {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(RequestError::MalformedBody(format!(
                            "excludeSelectors entries must be strings, got {}",
                            other
                        ))),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            Some(_) => {
                return Err(RequestError::MalformedBody(
                    "excludeSelectors must be an array of strings".to_string(),
                ))
            }
        };

        let request = Self {
            url,
            exclude_selectors,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the URL is absolute, of a supported scheme, and not oversized
    pub fn validate(&self) -> std::result::Result<(), RequestError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(RequestError::MissingUrl);
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(RequestError::InvalidUrl(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )));
        }

        let parsed = Url::parse(url).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", e, url)))?;
        match parsed.scheme() {
            "http" | "https" | "file" => Ok(()),
            other => Err(RequestError::InvalidUrl(format!(
                "URL must use http, https or file, not {}",
                other
            ))),
        }
    }

    /// Selectors to hide; empty when none were given
    pub fn selectors(&self) -> &[String] {
        self.exclude_selectors.as_deref().unwrap_or(&[])
    }
}

/// Per-export pipeline settings chosen by the deployment
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Wait policy and navigation timeout
    pub navigation: NavigationOptions,
    /// Paper, margins and render timeout
    pub render: RenderOptions,
    /// Fetch predicate installed before navigation
    pub filter: ResourceFilter,
    /// Handling of selectors the page rejects
    pub redaction: RedactionPolicy,
}

/// Rendered PDF tagged with the delivery mode it is headed for
#[derive(Debug)]
pub struct ExportResult {
    /// PDF bytes
    pub pdf: Vec<u8>,
    /// Delivery path this result will take
    pub mode: DeliveryMode,
    /// What the redactor did
    pub redaction: RedactionReport,
    /// Time spent between launch and release, in milliseconds
    pub duration_ms: u64,
}

/// Runs the export pipeline against a [`BrowserEngine`]
#[derive(Clone)]
pub struct Exporter {
    engine: Arc<dyn BrowserEngine>,
    settings: ExportSettings,
    delivery: DeliveryStrategy,
}

impl Exporter {
    /// Exporter using `engine` with the given settings and delivery
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        settings: ExportSettings,
        delivery: DeliveryStrategy,
    ) -> Self {
        Self {
            engine,
            settings,
            delivery,
        }
    }

    /// Pipeline settings
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Configured delivery mode
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery.mode()
    }

    /// Render and deliver one request
    pub async fn export(&self, request: &ExportRequest) -> Result<Delivered> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("export", %request_id, url = %request.url);

        async move {
            let result = self.render(request).await?;
            self.delivery.deliver(result.pdf).await.map_err(|e| {
                error!(kind = %e.kind(), "Delivery failed: {}", e);
                e
            })
        }
        .instrument(span)
        .await
    }

    /// Render one request to PDF bytes without delivering them.
    ///
    /// The engine session is released before this returns, whatever the
    /// outcome.
    #[instrument(skip(self, request))]
    pub async fn render(&self, request: &ExportRequest) -> Result<ExportResult> {
        request.validate()?;
        let start = Instant::now();

        let mut session = self.engine.launch().await.map_err(|e| {
            error!(kind = %e.kind(), "Engine launch failed: {}", e);
            e
        })?;

        let outcome = self.drive(session.as_mut(), request).await;

        release("Engine session", session.close()).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok((pdf, redaction)) => {
                info!("Rendered {} bytes in {}ms", pdf.len(), duration_ms);
                Ok(ExportResult {
                    pdf,
                    mode: self.delivery.mode(),
                    redaction,
                    duration_ms,
                })
            }
            Err(e) => {
                error!(kind = %e.kind(), "Export failed after {}ms: {}", duration_ms, e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn EngineSession,
        request: &ExportRequest,
    ) -> Result<(Vec<u8>, RedactionReport)> {
        session.set_request_filter(self.settings.filter.clone()).await?;
        // `url` is public and may be set without going through `new`
        session.goto(request.url.trim(), &self.settings.navigation).await?;

        let selectors = request.selectors();
        let redaction = if selectors.is_empty() {
            RedactionReport::default()
        } else {
            session.hide_elements(selectors, self.settings.redaction).await?
        };

        let pdf = session.pdf(&self.settings.render).await?;
        Ok((pdf, redaction))
    }
}
