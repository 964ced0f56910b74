//! Browser automation module
//!
//! This module provides browser control through ChromiumOxide: lifecycle
//! management, request filtering, navigation, element hiding and PDF capture.

pub mod capture;
pub mod controller;
pub mod filter;
pub mod navigation;
pub mod redact;

pub use capture::{PageMargins, PaperFormat, PdfRenderer, RenderOptions};
pub use controller::{BrowserConfig, BrowserController, PageHandle};
pub use filter::{FilterStats, RequestInterceptor, ResourceFilter, ResourceKind};
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator, WaitUntil};
pub use redact::{ContentRedactor, RedactionPolicy, RedactionReport};
