//! Service configuration
//!
//! Every setting is a command-line flag that can also come from a
//! `PAGEPRESS_*` environment variable. [`ServiceConfig::from_args`] validates
//! the whole set once at startup; any error there is fatal.
//!
//! # Environment Variables
//!
//! - `PAGEPRESS_HOST` / `PAGEPRESS_PORT`: bind address (default 127.0.0.1:3000)
//! - `PAGEPRESS_DELIVERY`: `attachment`, `inline-base64` or `uploaded-url`
//! - `PAGEPRESS_WAIT_UNTIL`: `domcontentloaded`, `load` or `networkidle`
//! - `PAGEPRESS_NAVIGATION_TIMEOUT_MS` / `PAGEPRESS_RENDER_TIMEOUT_MS`
//! - `PAGEPRESS_UPLOAD_ENDPOINT` / `PAGEPRESS_UPLOAD_API_KEY`: required for upload delivery

use crate::browser::{
    BrowserConfig, NavigationOptions, RedactionPolicy, RenderOptions, ResourceFilter,
    ResourceKind, WaitUntil,
};
use crate::delivery::{DeliveryMode, UploadConfig};
use crate::error::ConfigError;
use crate::export::ExportSettings;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use url::Url;

/// Pagepress command line / environment settings
#[derive(Parser, Debug, Clone)]
#[command(name = "pagepress")]
#[command(version)]
#[command(about = "Render a web page to PDF in headless Chromium")]
pub struct ServiceArgs {
    /// Port to listen on
    #[arg(short, long, env = "PAGEPRESS_PORT", default_value = "3000")]
    pub port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, env = "PAGEPRESS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Enable verbose logging
    #[arg(short, long, env = "PAGEPRESS_VERBOSE")]
    pub verbose: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long, env = "PAGEPRESS_CHROME_PATH")]
    pub chrome_path: Option<String>,

    /// Disable the Chromium sandbox (containers without user namespaces)
    #[arg(long, env = "PAGEPRESS_NO_SANDBOX")]
    pub no_sandbox: bool,

    /// Extra Chromium flag; repeat for several
    #[arg(long = "chrome-arg", env = "PAGEPRESS_CHROME_ARGS", value_delimiter = ',')]
    pub chrome_args: Vec<String>,

    /// How the PDF is returned
    #[arg(long, env = "PAGEPRESS_DELIVERY", default_value = "attachment")]
    pub delivery: DeliveryMode,

    /// Lifecycle signal that ends navigation
    #[arg(long, env = "PAGEPRESS_WAIT_UNTIL", default_value = "domcontentloaded")]
    pub wait_until: WaitUntil,

    /// Navigation timeout in milliseconds
    #[arg(long, env = "PAGEPRESS_NAVIGATION_TIMEOUT_MS", default_value = "10000")]
    pub navigation_timeout_ms: u64,

    /// Render timeout in milliseconds
    #[arg(long, env = "PAGEPRESS_RENDER_TIMEOUT_MS", default_value = "30000")]
    pub render_timeout_ms: u64,

    /// Print without page margins
    #[arg(long, env = "PAGEPRESS_NO_MARGINS")]
    pub no_margins: bool,

    /// Resource types aborted during page load
    #[arg(
        long = "block",
        env = "PAGEPRESS_BLOCK",
        value_delimiter = ',',
        default_value = "image,stylesheet,font"
    )]
    pub blocked_resources: Vec<ResourceKind>,

    /// Allow every resource type through
    #[arg(long, env = "PAGEPRESS_ALLOW_ALL_RESOURCES", conflicts_with = "blocked_resources")]
    pub allow_all_resources: bool,

    /// What to do with selectors the page cannot parse
    #[arg(long, env = "PAGEPRESS_REDACTION_POLICY", default_value = "strict")]
    pub redaction_policy: RedactionPolicy,

    /// Allowed CORS origins; `*` for any, `localhost` for loopback. Empty disables CORS.
    #[arg(long = "cors-origin", env = "PAGEPRESS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Upload endpoint (uploaded-url delivery)
    #[arg(long, env = "PAGEPRESS_UPLOAD_ENDPOINT")]
    pub upload_endpoint: Option<String>,

    /// Upload API key (uploaded-url delivery)
    #[arg(long, env = "PAGEPRESS_UPLOAD_API_KEY", hide_env_values = true)]
    pub upload_api_key: Option<String>,

    /// Upload folder sent with each file
    #[arg(long, env = "PAGEPRESS_UPLOAD_FOLDER")]
    pub upload_folder: Option<String>,

    /// Upload request timeout in milliseconds
    #[arg(long, env = "PAGEPRESS_UPLOAD_TIMEOUT_MS", default_value = "30000")]
    pub upload_timeout_ms: u64,
}

/// Delivery selection plus credentials when uploading
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Selected mode
    pub mode: DeliveryMode,
    /// Present exactly when `mode` is `UploadedUrl`
    pub upload: Option<UploadConfig>,
}

/// Validated service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket to bind
    pub bind_addr: SocketAddr,
    /// Verbose logging requested
    pub verbose: bool,
    /// Chromium launch settings
    pub browser: BrowserConfig,
    /// Per-export pipeline settings
    pub export: ExportSettings,
    /// Output packaging
    pub delivery: DeliveryConfig,
    /// CORS allow-list
    pub cors_origins: Vec<String>,
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServiceConfig {
    /// Validate parsed arguments into a configuration
    pub fn from_args(args: ServiceArgs) -> Result<Self, ConfigError> {
        let host: IpAddr = args.host.parse().map_err(|e| ConfigError::InvalidValue {
            name: "host",
            reason: format!("{}", e),
        })?;

        let navigation_timeout_ms = positive("navigation timeout", args.navigation_timeout_ms)?;
        let render_timeout_ms = positive("render timeout", args.render_timeout_ms)?;

        let mut browser = BrowserConfig::builder()
            .sandbox(!args.no_sandbox)
            .intercept_requests(true)
            .request_timeout_ms(navigation_timeout_ms.max(render_timeout_ms));
        if let Some(path) = non_empty(args.chrome_path) {
            browser = browser.chrome_path(path);
        }
        for arg in args.chrome_args.into_iter().filter(|a| !a.trim().is_empty()) {
            browser = browser.arg(arg);
        }

        let filter = if args.allow_all_resources {
            ResourceFilter::allow_all()
        } else {
            ResourceFilter::blocking(args.blocked_resources)
        };

        let mut render = RenderOptions::a4(render_timeout_ms);
        if args.no_margins {
            render = render.without_margins();
        }

        let export = ExportSettings {
            navigation: NavigationOptions::new(args.wait_until, navigation_timeout_ms),
            render,
            filter,
            redaction: args.redaction_policy,
        };

        let upload = match args.delivery {
            DeliveryMode::UploadedUrl => {
                let endpoint = non_empty(args.upload_endpoint)
                    .ok_or(ConfigError::MissingUploadSetting("PAGEPRESS_UPLOAD_ENDPOINT"))?;
                let endpoint = Url::parse(&endpoint).map_err(|e| ConfigError::InvalidValue {
                    name: "upload endpoint",
                    reason: e.to_string(),
                })?;
                if !matches!(endpoint.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidValue {
                        name: "upload endpoint",
                        reason: format!("unsupported scheme {}", endpoint.scheme()),
                    });
                }
                let api_key = non_empty(args.upload_api_key)
                    .ok_or(ConfigError::MissingUploadSetting("PAGEPRESS_UPLOAD_API_KEY"))?;

                Some(UploadConfig {
                    endpoint,
                    api_key,
                    folder: non_empty(args.upload_folder),
                    timeout_ms: positive("upload timeout", args.upload_timeout_ms)?,
                })
            }
            _ => None,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, args.port),
            verbose: args.verbose,
            browser: browser.build(),
            export,
            delivery: DeliveryConfig {
                mode: args.delivery,
                upload,
            },
            cors_origins: args
                .cors_origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        })
    }
}
