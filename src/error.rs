//! Error types for Pagepress
//!
//! Every failure in the export pipeline is an [`Error`]. The sub-enums mirror
//! the pipeline stages, and [`Error::kind`] folds them onto the flat
//! [`ErrorKind`] taxonomy used for logging and status counters.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The main error type for Pagepress operations
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied a request the pipeline refuses to run
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    /// Browser lifecycle errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Element hiding errors
    #[error("Redaction error: {0}")]
    Redaction(#[from] RedactionError),

    /// PDF capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Object-storage upload errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Startup configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors outside a specific stage
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Request validation errors, raised before any browser work begins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// HTTP method other than POST
    #[error("Method Not Allowed: {0}")]
    MethodNotAllowed(String),

    /// `url` missing or empty
    #[error("URL is required")]
    MissingUrl,

    /// `url` present but not an acceptable absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Body is not the expected JSON shape
    #[error("Malformed body: {0}")]
    MalformedBody(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Request interception could not be installed
    #[error("Failed to install request filter: {0}")]
    FilterFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),
}

/// Errors raised while hiding elements inside the page
#[derive(Error, Debug)]
pub enum RedactionError {
    /// The page rejected the script, usually a malformed selector
    #[error("Page evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The script ran but returned something unexpected
    #[error("Unexpected redaction result: {0}")]
    UnexpectedResult(String),
}

/// PDF capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// PDF generation failed
    #[error("PDF generation failed: {0}")]
    PdfFailed(String),

    /// Capture timeout
    #[error("Capture timed out after {0}ms")]
    Timeout(u64),
}

/// Object-storage upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// Transport-level failure talking to the storage service
    #[error("Upload request failed: {0}")]
    RequestFailed(String),

    /// Storage service answered with a non-success status
    #[error("Upload rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Storage service answered without a usable URL
    #[error("Upload response did not contain a URL")]
    MissingUrl,
}

/// Startup configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Upload mode selected without credentials
    #[error("Upload delivery requires {0} to be set")]
    MissingUploadSetting(&'static str),

    /// A value that parsed but is not usable
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Setting name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Flat failure taxonomy used for logs and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad method, missing or malformed url, bad body
    InvalidRequest,
    /// Browser could not be started or a page could not be opened
    EngineLaunchFailure,
    /// Navigation exceeded its timeout
    NavigationTimeout,
    /// Navigation failed for any other reason
    NavigationFailure,
    /// Element hiding failed
    RedactionFailure,
    /// PDF capture exceeded its timeout
    RenderTimeout,
    /// PDF capture failed for any other reason
    RenderFailure,
    /// Upload failed or returned no URL
    UploadFailure,
    /// Startup configuration problem
    Configuration,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::InvalidRequest,
        ErrorKind::EngineLaunchFailure,
        ErrorKind::NavigationTimeout,
        ErrorKind::NavigationFailure,
        ErrorKind::RedactionFailure,
        ErrorKind::RenderTimeout,
        ErrorKind::RenderFailure,
        ErrorKind::UploadFailure,
        ErrorKind::Configuration,
        ErrorKind::Internal,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::EngineLaunchFailure => "engine_launch_failure",
            ErrorKind::NavigationTimeout => "navigation_timeout",
            ErrorKind::NavigationFailure => "navigation_failure",
            ErrorKind::RedactionFailure => "redaction_failure",
            ErrorKind::RenderTimeout => "render_timeout",
            ErrorKind::RenderFailure => "render_failure",
            ErrorKind::UploadFailure => "upload_failure",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether the caller is at fault (client error) rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::InvalidRequest)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for Pagepress operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Map onto the flat failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Request(_) => ErrorKind::InvalidRequest,
            Error::Browser(_) => ErrorKind::EngineLaunchFailure,
            Error::Navigation(NavigationError::Timeout(_)) => ErrorKind::NavigationTimeout,
            Error::Navigation(_) => ErrorKind::NavigationFailure,
            Error::Redaction(_) => ErrorKind::RedactionFailure,
            Error::Capture(CaptureError::Timeout(_)) => ErrorKind::RenderTimeout,
            Error::Capture(_) => ErrorKind::RenderFailure,
            Error::Upload(_) => ErrorKind::UploadFailure,
            Error::Config(_) => ErrorKind::Configuration,
            Error::Json(_) | Error::Cdp(_) | Error::Generic(_) => ErrorKind::Internal,
        }
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Browser(BrowserError::LaunchFailed("no chrome".to_string()));
        assert!(err.to_string().contains("Failed to launch browser"));
        assert!(err.to_string().contains("no chrome"));
    }

    #[test]
    fn test_missing_url_message() {
        assert_eq!(RequestError::MissingUrl.to_string(), "URL is required");
    }

    #[test]
    fn test_kind_separates_timeouts_from_failures() {
        let nav_timeout: Error = NavigationError::Timeout(10_000).into();
        let nav_failed: Error = NavigationError::LoadFailed("net::ERR".to_string()).into();
        let render_timeout: Error = CaptureError::Timeout(30_000).into();
        let render_failed: Error = CaptureError::PdfFailed("crashed".to_string()).into();

        assert_eq!(nav_timeout.kind(), ErrorKind::NavigationTimeout);
        assert_eq!(nav_failed.kind(), ErrorKind::NavigationFailure);
        assert_eq!(render_timeout.kind(), ErrorKind::RenderTimeout);
        assert_eq!(render_failed.kind(), ErrorKind::RenderFailure);
    }

    #[test]
    fn test_kind_for_remaining_stages() {
        let launch: Error = BrowserError::LaunchFailed("oom".to_string()).into();
        let page: Error = BrowserError::PageCreationFailed("target closed".to_string()).into();
        let no_executable: Error =
            BrowserError::LaunchFailed("Could not auto detect a chrome executable".to_string())
                .into();
        let redact: Error = RedactionError::EvaluationFailed("SyntaxError".to_string()).into();
        let upload: Error = UploadError::MissingUrl.into();
        let request: Error = RequestError::MissingUrl.into();

        assert_eq!(launch.kind(), ErrorKind::EngineLaunchFailure);
        assert_eq!(page.kind(), ErrorKind::EngineLaunchFailure);
        assert_eq!(no_executable.kind(), ErrorKind::EngineLaunchFailure);
        assert_eq!(redact.kind(), ErrorKind::RedactionFailure);
        assert_eq!(upload.kind(), ErrorKind::UploadFailure);
        assert_eq!(request.kind(), ErrorKind::InvalidRequest);
        assert!(request.kind().is_client_error());
        assert!(!upload.kind().is_client_error());
    }

    #[test]
    fn test_upload_rejected_display() {
        let err = UploadError::Rejected {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_error_kind_names_are_unique() {
        let mut names: Vec<&str> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
