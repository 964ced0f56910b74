//! Page navigation functionality
//!
//! Navigation is a single attempt bounded by a timeout. The attempt is done
//! once the main frame reports the configured lifecycle event for the new
//! document.

use crate::browser::PageHandle;
use crate::error::{Error, NavigationError, Result};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Options for page navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Lifecycle signal that ends navigation
    pub wait_until: WaitUntil,
}

impl NavigationOptions {
    /// Options with an explicit policy and timeout
    pub fn new(wait_until: WaitUntil, timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            wait_until,
        }
    }

    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// DOM parsed; fast, may miss late dynamic content
    DomContentLoaded,
    /// Load event fired
    Load,
    /// No network activity for 500ms; slow, most complete
    NetworkIdle,
}

impl WaitUntil {
    /// Name of the CDP `Page.lifecycleEvent` that satisfies this condition
    pub fn lifecycle_event(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "DOMContentLoaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkIdle",
        }
    }

    /// Lowercase name, as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domcontentloaded" | "dom-content-loaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" | "networkidle0" | "network-idle" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!(
                "unknown wait policy '{}' (expected domcontentloaded, load or networkidle)",
                other
            )),
        }
    }
}

/// Result of a navigation operation
#[derive(Debug)]
pub struct NavigationResult {
    /// Final URL after any redirects
    pub final_url: String,
    /// Navigation duration in milliseconds
    pub duration_ms: u64,
}

/// Page navigator
pub struct PageNavigator;

impl PageNavigator {
    /// Navigate to `url` and wait for the configured lifecycle event.
    #[instrument(skip(page))]
    pub async fn goto(
        page: &PageHandle,
        url: &str,
        options: &NavigationOptions,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        info!("Navigating to: {} (wait until {})", url, options.wait_until);

        tokio::time::timeout(options.timeout(), Self::navigate_once(&page.page, url, options))
            .await
            .map_err(|_| NavigationError::Timeout(options.timeout_ms))??;

        let final_url = page
            .page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_else(|| url.to_string());
        page.set_url(final_url.clone()).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!("Navigation complete: {} -> {} in {}ms", url, final_url, duration_ms);

        Ok(NavigationResult {
            final_url,
            duration_ms,
        })
    }

    async fn navigate_once(
        page: &chromiumoxide::Page,
        url: &str,
        options: &NavigationOptions,
    ) -> Result<()> {
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        // Subscribe before navigating so the event cannot be missed
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?
            .result;

        if let Some(error_text) = navigation.error_text.filter(|t| !t.is_empty()) {
            return Err(NavigationError::LoadFailed(error_text).into());
        }

        let wanted = options.wait_until.lifecycle_event();
        while let Some(event) = lifecycle.next().await {
            if event.frame_id != navigation.frame_id || event.name != wanted {
                continue;
            }
            // Same-document navigations carry no loader id
            match navigation.loader_id.as_ref() {
                Some(loader) if *loader != event.loader_id => continue,
                _ => return Ok(()),
            }
        }

        Err(NavigationError::LoadFailed("page closed before navigation finished".to_string()).into())
    }
}
