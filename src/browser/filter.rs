//! Request interception
//!
//! The filter decides per fetch whether the browser may proceed. Chromium pauses
//! every request once interception is enabled on the browser, so the
//! interceptor must answer every paused request: continue or fail.

use crate::error::{BrowserError, Result};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Browser classification of a network fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Top-level or frame document
    Document,
    /// CSS
    Stylesheet,
    /// Raster or vector image
    Image,
    /// Audio/video
    Media,
    /// Web font
    Font,
    /// JavaScript
    Script,
    /// XMLHttpRequest
    Xhr,
    /// fetch()
    Fetch,
    /// WebSocket handshake
    WebSocket,
    /// Anything else (manifest, ping, prefetch, ...)
    Other,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Document,
        ResourceKind::Stylesheet,
        ResourceKind::Image,
        ResourceKind::Media,
        ResourceKind::Font,
        ResourceKind::Script,
        ResourceKind::Xhr,
        ResourceKind::Fetch,
        ResourceKind::WebSocket,
        ResourceKind::Other,
    ];

    /// Lowercase name, as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Image => "image",
            ResourceKind::Media => "media",
            ResourceKind::Font => "font",
            ResourceKind::Script => "script",
            ResourceKind::Xhr => "xhr",
            ResourceKind::Fetch => "fetch",
            ResourceKind::WebSocket => "websocket",
            ResourceKind::Other => "other",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(ResourceKind::Document),
            "stylesheet" | "css" => Ok(ResourceKind::Stylesheet),
            "image" => Ok(ResourceKind::Image),
            "media" => Ok(ResourceKind::Media),
            "font" => Ok(ResourceKind::Font),
            "script" => Ok(ResourceKind::Script),
            "xhr" => Ok(ResourceKind::Xhr),
            "fetch" => Ok(ResourceKind::Fetch),
            "websocket" => Ok(ResourceKind::WebSocket),
            "other" => Ok(ResourceKind::Other),
            other => Err(format!("unknown resource type: {}", other)),
        }
    }
}

impl From<&ResourceType> for ResourceKind {
    #[allow(unreachable_patterns)]
    fn from(value: &ResourceType) -> Self {
        match value {
            ResourceType::Document => ResourceKind::Document,
            ResourceType::Stylesheet => ResourceKind::Stylesheet,
            ResourceType::Image => ResourceKind::Image,
            ResourceType::Media => ResourceKind::Media,
            ResourceType::Font => ResourceKind::Font,
            ResourceType::Script => ResourceKind::Script,
            ResourceType::Xhr => ResourceKind::Xhr,
            ResourceType::Fetch => ResourceKind::Fetch,
            ResourceType::WebSocket => ResourceKind::WebSocket,
            _ => ResourceKind::Other,
        }
    }
}

/// Predicate over resource kinds: everything in `blocked` is aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    blocked: BTreeSet<ResourceKind>,
}

impl Default for ResourceFilter {
    /// Blocks images, stylesheets and fonts
    fn default() -> Self {
        Self::blocking([
            ResourceKind::Image,
            ResourceKind::Stylesheet,
            ResourceKind::Font,
        ])
    }
}

impl ResourceFilter {
    /// Filter that blocks the given kinds
    pub fn blocking<I: IntoIterator<Item = ResourceKind>>(kinds: I) -> Self {
        Self {
            blocked: kinds.into_iter().collect(),
        }
    }

    /// Filter that lets every fetch through
    pub fn allow_all() -> Self {
        Self {
            blocked: BTreeSet::new(),
        }
    }

    /// Decide a single fetch
    #[inline]
    pub fn should_allow(&self, kind: ResourceKind) -> bool {
        !self.blocked.contains(&kind)
    }

    /// Kinds this filter aborts
    pub fn blocked(&self) -> impl Iterator<Item = &ResourceKind> {
        self.blocked.iter()
    }
}

/// Allowed/blocked tallies for one page load
#[derive(Debug, Default)]
pub struct FilterStats {
    allowed: AtomicU64,
    blocked: AtomicU64,
}

impl FilterStats {
    /// Fetches continued
    pub fn allowed(&self) -> u64 {
        self.allowed.load(Ordering::Relaxed)
    }

    /// Fetches aborted
    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    fn record(&self, allowed: bool) {
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Running interception task bound to a page
pub struct RequestInterceptor {
    task: JoinHandle<()>,
    stats: Arc<FilterStats>,
}

impl RequestInterceptor {
    /// Subscribe to paused requests on `page` and answer each with `filter`.
    ///
    /// The browser must have been launched with request interception enabled,
    /// and this must run before the page navigates.
    pub async fn install(page: &Page, filter: ResourceFilter) -> Result<Self> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::FilterFailed(e.to_string()))?;

        let stats = Arc::new(FilterStats::default());
        let task_stats = Arc::clone(&stats);
        let page = page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let kind = ResourceKind::from(&event.resource_type);
                let allow = filter.should_allow(kind);
                task_stats.record(allow);
                trace!(%kind, allow, url = %event.request.url, "Request paused");

                let outcome = if allow {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                } else {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                };

                if let Err(e) = outcome {
                    warn!("Failed to answer paused request: {}", e);
                }
            }
            debug!("Request interception stream ended");
        });

        Ok(Self { task, stats })
    }

    /// Counters shared with the interception task
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Stop answering requests
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RequestInterceptor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
