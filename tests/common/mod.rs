//! In-memory engine and object store shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pagepress::browser::{
    NavigationOptions, RedactionPolicy, RedactionReport, RenderOptions, ResourceFilter, WaitUntil,
};
use pagepress::delivery::{ObjectStore, UploadReceipt};
use pagepress::engine::{BrowserEngine, EngineSession};
use pagepress::error::{
    BrowserError, CaptureError, NavigationError, RedactionError, Result, UploadError,
};
use pagepress::export::ExportSettings;
use parking_lot::Mutex;
use std::sync::Arc;

/// Bytes every fake render returns
pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake\n%%EOF";

/// One recorded engine interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Launch,
    SetFilter(ResourceFilter),
    Goto(String, NavigationOptions),
    Hide(Vec<String>, RedactionPolicy),
    Pdf(RenderOptions),
    Close,
}

/// Stage at which the fake engine fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nowhere,
    Launch,
    Filter,
    NavigationTimeout,
    Navigation,
    Redaction,
    RenderTimeout,
    Render,
}

/// Engine that records every call into a shared log
#[derive(Clone)]
pub struct FakeEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_at: FailAt,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::failing_at(FailAt::Nowhere)
    }

    pub fn failing_at(fail_at: FailAt) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| call(c)).count()
    }

    pub fn launches(&self) -> usize {
        self.count(|c| matches!(c, Call::Launch))
    }

    pub fn closes(&self) -> usize {
        self.count(|c| matches!(c, Call::Close))
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn EngineSession>> {
        self.calls.lock().push(Call::Launch);
        if self.fail_at == FailAt::Launch {
            return Err(BrowserError::LaunchFailed("no chromium in test".to_string()).into());
        }
        Ok(Box::new(FakeSession {
            calls: Arc::clone(&self.calls),
            fail_at: self.fail_at,
        }))
    }
}

struct FakeSession {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_at: FailAt,
}

#[async_trait]
impl EngineSession for FakeSession {
    async fn set_request_filter(&mut self, filter: ResourceFilter) -> Result<()> {
        self.calls.lock().push(Call::SetFilter(filter));
        if self.fail_at == FailAt::Filter {
            return Err(BrowserError::FilterFailed("Fetch.enable rejected".to_string()).into());
        }
        Ok(())
    }

    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<()> {
        self.calls.lock().push(Call::Goto(url.to_string(), *options));
        match self.fail_at {
            FailAt::NavigationTimeout => Err(NavigationError::Timeout(options.timeout_ms).into()),
            FailAt::Navigation => {
                Err(NavigationError::LoadFailed("net::ERR_NAME_NOT_RESOLVED".to_string()).into())
            }
            _ => Ok(()),
        }
    }

    async fn hide_elements(
        &mut self,
        selectors: &[String],
        policy: RedactionPolicy,
    ) -> Result<RedactionReport> {
        self.calls
            .lock()
            .push(Call::Hide(selectors.to_vec(), policy));
        if self.fail_at == FailAt::Redaction {
            return Err(RedactionError::EvaluationFailed("not a valid selector".to_string()).into());
        }
        Ok(RedactionReport {
            hidden: selectors.len() as u64,
            skipped: Vec::new(),
        })
    }

    async fn pdf(&mut self, options: &RenderOptions) -> Result<Vec<u8>> {
        self.calls.lock().push(Call::Pdf(options.clone()));
        match self.fail_at {
            FailAt::RenderTimeout => Err(CaptureError::Timeout(options.timeout_ms).into()),
            FailAt::Render => Err(CaptureError::PdfFailed("Printing failed".to_string()).into()),
            _ => Ok(FAKE_PDF.to_vec()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.calls.lock().push(Call::Close);
        Ok(())
    }
}

/// Object store that records filenames and answers with a fixed outcome
pub struct FakeStore {
    pub uploads: Mutex<Vec<(String, usize)>>,
    url: Option<String>,
}

impl FakeStore {
    pub fn returning(url: &str) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            url: Some(url.to_string()),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            url: None,
        })
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadReceipt> {
        self.uploads.lock().push((filename.to_string(), bytes.len()));
        match &self.url {
            Some(url) => Ok(UploadReceipt { url: url.clone() }),
            None => Err(UploadError::Rejected {
                status: 503,
                message: "storage unavailable".to_string(),
            }
            .into()),
        }
    }
}

/// Settings matching the service defaults
pub fn settings() -> ExportSettings {
    ExportSettings {
        navigation: NavigationOptions::new(WaitUntil::DomContentLoaded, 10_000),
        render: RenderOptions::a4(30_000),
        filter: ResourceFilter::default(),
        redaction: RedactionPolicy::Strict,
    }
}
