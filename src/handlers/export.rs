//! Export endpoint
//!
//! Accepts `POST` with a JSON body `{ "url": "...", "excludeSelectors": [...] }`
//! and answers with the PDF in the configured delivery shape. Failures map to:
//!
//! | Failure              | Status | Body                                              |
//! |----------------------|--------|---------------------------------------------------|
//! | method other than POST | 405  | `{"error":"Method Not Allowed"}`                  |
//! | missing `url`        | 400    | `{"error":"URL is required"}`                     |
//! | other bad input      | 400    | `{"error":"Invalid request","details":"..."}`     |
//! | anything else        | 500    | `{"error":"Internal Server Error","details":"..."}` |

use super::ServiceState;
use crate::delivery::{Delivered, PDF_MIME};
use crate::error::{Error, RequestError};
use crate::export::ExportRequest;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// JSON error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short, stable message
    pub error: String,
    /// Underlying failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: &str, details: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            details,
        }
    }
}

/// Map a pipeline error to its HTTP response
pub fn error_response(err: &Error) -> Response {
    let (status, body) = match err {
        Error::Request(RequestError::MethodNotAllowed(_)) => (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody::new("Method Not Allowed", None),
        ),
        Error::Request(RequestError::MissingUrl) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("URL is required", None),
        ),
        Error::Request(inner) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Invalid request", Some(inner.to_string())),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("Internal Server Error", Some(other.to_string())),
        ),
    };

    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::METHOD_NOT_ALLOWED {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST"));
    }
    response
}

impl IntoResponse for Delivered {
    fn into_response(self) -> Response {
        let disposition = self.content_disposition();
        match self {
            Delivered::Attachment { bytes, .. } => {
                let mut response = (StatusCode::OK, bytes).into_response();
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PDF_MIME));
                if let Some(value) = disposition.and_then(|d| HeaderValue::from_str(&d).ok()) {
                    headers.insert(header::CONTENT_DISPOSITION, value);
                }
                response
            }
            Delivered::Inline(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
            Delivered::Uploaded(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        }
    }
}

/// Fallback for every method other than POST on the export routes.
pub async fn method_not_allowed(
    State(state): State<Arc<ServiceState>>,
    method: Method,
) -> Response {
    debug!("Rejecting {} on export route", method);
    let err: Error = RequestError::MethodNotAllowed(method.to_string()).into();
    state.metrics.record_failure(err.kind());
    error_response(&err)
}

/// `POST /api/generate-pdf`
///
/// The export runs on its own task so that a client hanging up mid-render
/// cannot cancel it between launch and release.
pub async fn export_handler(State(state): State<Arc<ServiceState>>, body: Bytes) -> Response {
    let request = match ExportRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected export request: {}", e);
            let err: Error = e.into();
            state.metrics.record_failure(err.kind());
            return error_response(&err);
        }
    };

    let start = Instant::now();
    let exporter = state.exporter.clone();
    let outcome = tokio::spawn(async move { exporter.export(&request).await })
        .await
        .unwrap_or_else(|e| Err(Error::generic(format!("Export task failed: {}", e))));
    state.metrics.record_latency(start.elapsed());

    match outcome {
        Ok(delivered) => {
            state.metrics.record_success();
            delivered.into_response()
        }
        Err(e) => {
            error!(kind = %e.kind(), "Export request failed: {}", e);
            state.metrics.record_failure(e.kind());
            error_response(&e)
        }
    }
}
