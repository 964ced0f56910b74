//! Element hiding before capture
//!
//! Matched elements get `display: none`; they stay in the DOM but are absent
//! from the printed output.

use crate::browser::PageHandle;
use crate::error::{RedactionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// What to do with a selector the page cannot parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedactionPolicy {
    /// Fail the export
    #[default]
    Strict,
    /// Skip that selector and keep going
    SkipInvalid,
}

impl RedactionPolicy {
    /// Kebab-case name, as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionPolicy::Strict => "strict",
            RedactionPolicy::SkipInvalid => "skip-invalid",
        }
    }
}

impl fmt::Display for RedactionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedactionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(RedactionPolicy::Strict),
            "skip-invalid" | "skip_invalid" | "skip" => Ok(RedactionPolicy::SkipInvalid),
            other => Err(format!(
                "unknown redaction policy '{}' (expected strict or skip-invalid)",
                other
            )),
        }
    }
}

/// Outcome of one redaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionReport {
    /// Elements hidden across all selectors
    pub hidden: u64,
    /// Selectors the page rejected (only under `SkipInvalid`)
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Hides elements inside the page's own execution context
pub struct ContentRedactor;

impl ContentRedactor {
    /// Build the in-page script for `selectors`.
    ///
    /// Selectors are embedded as a JSON array literal, so no caller string is
    /// ever spliced into the script source unescaped.
    pub fn script(selectors: &[String], policy: RedactionPolicy) -> Result<String> {
        let list = serde_json::to_string(selectors)?;
        let lenient = matches!(policy, RedactionPolicy::SkipInvalid);

        Ok(format!(
            r#"((selectors, lenient) => {{
    let hidden = 0;
    const skipped = [];
    for (const selector of selectors) {{
        let matches;
        try {{
            matches = document.querySelectorAll(selector);
        }} catch (err) {{
            if (!lenient) throw err;
            skipped.push(selector);
            continue;
        }}
        matches.forEach(el => {{
            el.style.display = "none";
            hidden += 1;
        }});
    }}
    return {{ hidden, skipped }};
}})({list}, {lenient})"#,
            list = list,
            lenient = lenient,
        ))
    }

    /// Hide every element matching any of `selectors`
    #[instrument(skip(page, selectors), fields(selectors = selectors.len()))]
    pub async fn redact(
        page: &PageHandle,
        selectors: &[String],
        policy: RedactionPolicy,
    ) -> Result<RedactionReport> {
        if selectors.is_empty() {
            debug!("No selectors, skipping redaction");
            return Ok(RedactionReport::default());
        }

        info!("Hiding elements for {} selector(s)", selectors.len());
        let script = Self::script(selectors, policy)?;

        let report: RedactionReport = page
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| RedactionError::EvaluationFailed(e.to_string()))?
            .into_value()
            .map_err(|e| RedactionError::UnexpectedResult(e.to_string()))?;

        if !report.skipped.is_empty() {
            warn!("Skipped invalid selectors: {:?}", report.skipped);
        }
        debug!("Hidden {} element(s)", report.hidden);

        Ok(report)
    }
}
