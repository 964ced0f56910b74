//! Browser lifecycle management
//!
//! One controller owns one Chromium process. The export pipeline launches a
//! controller per request and closes it on every exit path.

use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How long `close` waits for a graceful browser shutdown before killing it
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Flags the service always passes to Chromium
pub const DEFAULT_ARGS: [&str; 3] = [
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
];

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width (default: 1280)
    pub width: u32,
    /// Browser window height (default: 800)
    pub height: u32,
    /// Enable sandbox. Containers without user namespaces need this off.
    pub sandbox: bool,
    /// Pause every request so a filter can decide it (default: true)
    pub intercept_requests: bool,
    /// CDP command timeout in milliseconds (default: 30000)
    pub request_timeout_ms: u64,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 800,
            sandbox: true,
            intercept_requests: true,
            request_timeout_ms: 30000,
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Create a new config builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Every command-line flag passed to Chromium, in order
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = DEFAULT_ARGS.iter().map(|a| a.to_string()).collect();
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
            args.push("--disable-setuid-sandbox".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set viewport dimensions
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Enable/disable sandbox
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Enable/disable request interception
    pub fn intercept_requests(mut self, intercept: bool) -> Self {
        self.config.intercept_requests = intercept;
        self
    }

    /// Set CDP command timeout
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Handle to an open browser page
#[derive(Clone)]
pub struct PageHandle {
    pub(crate) page: Page,
    pub(crate) url: Arc<RwLock<String>>,
}

impl PageHandle {
    /// Get the underlying chromiumoxide Page
    pub fn inner(&self) -> &Page {
        &self.page
    }

    /// Get the current URL
    pub async fn url(&self) -> String {
        self.url.read().await.clone()
    }

    /// Set the current URL (internal use)
    pub(crate) async fn set_url(&self, url: String) {
        *self.url.write().await = url;
    }
}

/// Owner of one Chromium process
pub struct BrowserController {
    browser: Browser,
    handler: JoinHandle<()>,
    config: BrowserConfig,
}

impl BrowserController {
    /// Launch Chromium with `config`
    #[instrument(skip(config), fields(sandbox = config.sandbox))]
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        info!("Launching browser: headless={}", config.headless);

        let mut builder = CdpBrowserConfig::builder()
            .viewport(chromiumoxide::handler::viewport::Viewport {
                width: config.width,
                height: config.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .request_timeout(Duration::from_millis(config.request_timeout_ms))
            .args(config.launch_args());

        if !config.headless {
            builder = builder.with_head();
        }

        if config.intercept_requests {
            builder = builder.enable_request_intercept();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        // Fails when no executable is given and none can be auto-detected
        let cdp_config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            handler: handler_task,
            config,
        })
    }

    /// Open a blank page
    #[instrument(skip(self))]
    pub async fn new_page(&self) -> Result<PageHandle> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        debug!("Created new page");

        Ok(PageHandle {
            page,
            url: Arc::new(RwLock::new("about:blank".to_string())),
        })
    }

    /// Get the browser configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Terminate the browser process.
    ///
    /// Tries a graceful `Browser.close` first and kills the child process if
    /// that fails or stalls. Only the kill failing is reported as an error.
    #[instrument(skip(self))]
    pub async fn close(mut self) -> Result<()> {
        info!("Closing browser");

        let graceful = tokio::time::timeout(CLOSE_GRACE, self.browser.close()).await;
        match graceful {
            Ok(Ok(_)) => {
                if let Err(e) = tokio::time::timeout(CLOSE_GRACE, self.browser.wait()).await {
                    warn!("Browser did not exit after close: {}", e);
                    self.kill().await?;
                }
            }
            Ok(Err(e)) => {
                warn!("Graceful browser close failed: {}", e);
                self.kill().await?;
            }
            Err(_) => {
                warn!("Graceful browser close timed out");
                self.kill().await?;
            }
        }

        let _ = tokio::time::timeout(CLOSE_GRACE, &mut self.handler).await;
        self.handler.abort();

        info!("Browser closed");
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        match self.browser.kill().await {
            Some(Err(e)) => Err(BrowserError::LaunchFailed(format!(
                "failed to kill browser process: {}",
                e
            ))
            .into()),
            _ => Ok(()),
        }
    }
}
