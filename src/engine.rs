//! Browser engine capability contract
//!
//! The export pipeline only talks to these two traits. [`ChromiumEngine`] is
//! the production implementation; tests substitute an in-memory engine.

use crate::browser::{
    BrowserConfig, BrowserController, ContentRedactor, NavigationOptions, PageHandle,
    PageNavigator, PdfRenderer, RedactionPolicy, RedactionReport, RenderOptions,
    RequestInterceptor, ResourceFilter,
};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, info, warn};

/// Something that can start an isolated browser session
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Start one engine process with exactly one open page
    async fn launch(&self) -> Result<Box<dyn EngineSession>>;
}

/// One engine process plus one page, owned by a single export
#[async_trait]
pub trait EngineSession: Send {
    /// Install the fetch predicate; must be called before `goto`
    async fn set_request_filter(&mut self, filter: ResourceFilter) -> Result<()>;

    /// Navigate and wait for the configured lifecycle signal
    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<()>;

    /// Hide all elements matching `selectors`
    async fn hide_elements(
        &mut self,
        selectors: &[String],
        policy: RedactionPolicy,
    ) -> Result<RedactionReport>;

    /// Print the current page to PDF
    async fn pdf(&mut self, options: &RenderOptions) -> Result<Vec<u8>>;

    /// Terminate the engine process
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Await a release, logging a failure instead of propagating it.
///
/// Returns `true` when the release was clean.
pub async fn release<F>(what: &str, close: F) -> bool
where
    F: Future<Output = Result<()>>,
{
    match close.await {
        Ok(()) => true,
        Err(e) => {
            warn!("{} release reported an error: {}", what, e);
            false
        }
    }
}

/// Headless Chromium over the DevTools protocol
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    config: BrowserConfig,
}

impl ChromiumEngine {
    /// Engine that launches Chromium with `config`
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Launch configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn EngineSession>> {
        let controller = BrowserController::launch(self.config.clone()).await?;

        let page = match controller.new_page().await {
            Ok(page) => page,
            Err(e) => {
                // Never leak the process when the page cannot be opened
                release("Browser after page failure", controller.close()).await;
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            controller,
            page,
            interceptor: None,
        }))
    }
}

/// Session backed by a live Chromium process
pub struct ChromiumSession {
    controller: BrowserController,
    page: PageHandle,
    interceptor: Option<RequestInterceptor>,
}

#[async_trait]
impl EngineSession for ChromiumSession {
    async fn set_request_filter(&mut self, filter: ResourceFilter) -> Result<()> {
        if !self.controller.config().intercept_requests {
            if filter.blocked().next().is_none() {
                return Ok(());
            }
            return Err(BrowserError::FilterFailed(
                "browser was launched without request interception".to_string(),
            )
            .into());
        }
        let interceptor = RequestInterceptor::install(self.page.inner(), filter).await?;
        self.interceptor = Some(interceptor);
        Ok(())
    }

    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<()> {
        PageNavigator::goto(&self.page, url, options).await?;
        Ok(())
    }

    async fn hide_elements(
        &mut self,
        selectors: &[String],
        policy: RedactionPolicy,
    ) -> Result<RedactionReport> {
        ContentRedactor::redact(&self.page, selectors, policy).await
    }

    async fn pdf(&mut self, options: &RenderOptions) -> Result<Vec<u8>> {
        PdfRenderer::render(&self.page, options).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            controller,
            page,
            interceptor,
        } = *self;

        if let Some(interceptor) = interceptor {
            interceptor.stop();
            let stats = interceptor.stats();
            info!(
                allowed = stats.allowed(),
                blocked = stats.blocked(),
                "Request filter summary"
            );
        }

        debug!("Releasing session for {}", page.url().await);
        controller.close().await
    }
}
