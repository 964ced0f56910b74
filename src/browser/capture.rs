//! PDF capture
//!
//! Drives Chromium's print-to-PDF with fixed A4 geometry under a render
//! timeout.

use crate::browser::PageHandle;
use crate::error::{CaptureError, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// CSS pixels per inch, as used by Chromium's print pipeline
const CSS_PX_PER_INCH: f64 = 96.0;

/// Paper geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaperFormat {
    /// ISO A4, 8.27in x 11.7in
    A4,
}

impl PaperFormat {
    /// Width and height in inches
    pub fn size_inches(&self) -> (f64, f64) {
        match self {
            PaperFormat::A4 => (8.27, 11.7),
        }
    }
}

/// Uniform page margins
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageMargins {
    /// Same inset on all four sides, in CSS pixels
    Uniform(f64),
    /// No margins at all
    None,
}

impl PageMargins {
    /// Default uniform 10px inset
    pub const DEFAULT_PX: f64 = 10.0;

    /// Inset in inches
    pub fn inches(&self) -> f64 {
        match self {
            PageMargins::Uniform(px) => px / CSS_PX_PER_INCH,
            PageMargins::None => 0.0,
        }
    }
}

/// Options for the PDF renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Paper geometry
    pub format: PaperFormat,
    /// Render CSS backgrounds
    pub print_background: bool,
    /// Page margins
    pub margins: PageMargins,
    /// Render timeout in milliseconds
    pub timeout_ms: u64,
}

impl RenderOptions {
    /// A4, backgrounds on, 10px margins, with the given render timeout
    pub fn a4(timeout_ms: u64) -> Self {
        Self {
            format: PaperFormat::A4,
            print_background: true,
            margins: PageMargins::Uniform(PageMargins::DEFAULT_PX),
            timeout_ms,
        }
    }

    /// Drop margins entirely
    pub fn without_margins(mut self) -> Self {
        self.margins = PageMargins::None;
        self
    }

    /// Render timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// CDP parameters for `Page.printToPDF`
    pub fn to_params(&self) -> PrintToPdfParams {
        let (width, height) = self.format.size_inches();
        let margin = self.margins.inches();

        PrintToPdfParams::builder()
            .print_background(self.print_background)
            .paper_width(width)
            .paper_height(height)
            .margin_top(margin)
            .margin_bottom(margin)
            .margin_left(margin)
            .margin_right(margin)
            .build()
    }
}

/// Produces PDF bytes from a loaded page
pub struct PdfRenderer;

impl PdfRenderer {
    /// Print the page to PDF, bounded by `options.timeout_ms`
    #[instrument(skip(page, options), fields(timeout_ms = options.timeout_ms))]
    pub async fn render(page: &PageHandle, options: &RenderOptions) -> Result<Vec<u8>> {
        info!("Generating PDF");
        let start = Instant::now();

        let data = tokio::time::timeout(options.timeout(), page.page.pdf(options.to_params()))
            .await
            .map_err(|_| CaptureError::Timeout(options.timeout_ms))?
            .map_err(|e| CaptureError::PdfFailed(e.to_string()))?;

        if data.is_empty() {
            return Err(CaptureError::PdfFailed("engine returned an empty document".to_string()).into());
        }

        debug!(
            "PDF generated: {} bytes in {}ms",
            data.len(),
            start.elapsed().as_millis()
        );
        Ok(data)
    }
}
