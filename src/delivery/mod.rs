//! Output delivery
//!
//! A rendered PDF leaves the service in exactly one of three shapes, chosen by
//! deployment configuration:
//!
//! ```text
//! Attachment    -> application/pdf body, filename export.pdf
//! InlineBase64  -> { "pdf": "data:application/pdf;base64,..." }
//! UploadedUrl   -> ObjectStore::upload -> { "pdfUrl": "https://..." }
//! ```

pub mod upload;

pub use upload::{unique_filename, HttpObjectStore, ObjectStore, UploadConfig, UploadReceipt};

use crate::error::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// MIME type of every rendered document
pub const PDF_MIME: &str = "application/pdf";

/// Suggested filename for attachment delivery
pub const ATTACHMENT_FILENAME: &str = "export.pdf";

/// Default prefix for uploaded filenames
pub const DEFAULT_UPLOAD_PREFIX: &str = "export";

/// How the rendered PDF is handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Raw bytes as a download
    #[default]
    Attachment,
    /// Base64 data URI inside JSON
    InlineBase64,
    /// Uploaded to object storage, URL inside JSON
    UploadedUrl,
}

impl DeliveryMode {
    /// Kebab-case name, as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Attachment => "attachment",
            DeliveryMode::InlineBase64 => "inline-base64",
            DeliveryMode::UploadedUrl => "uploaded-url",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attachment" | "binary" => Ok(DeliveryMode::Attachment),
            "inline-base64" | "inline" | "base64" => Ok(DeliveryMode::InlineBase64),
            "uploaded-url" | "upload" | "url" => Ok(DeliveryMode::UploadedUrl),
            other => Err(format!(
                "unknown delivery mode '{}' (expected attachment, inline-base64 or uploaded-url)",
                other
            )),
        }
    }
}

/// JSON envelope for inline delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePdf {
    /// `data:application/pdf;base64,...`
    pub pdf: String,
}

/// JSON envelope for uploaded delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPdf {
    /// Durable URL of the uploaded file
    #[serde(rename = "pdfUrl")]
    pub pdf_url: String,
}

/// A PDF packaged for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// Raw bytes with a suggested filename
    Attachment {
        /// PDF bytes
        bytes: Vec<u8>,
        /// Suggested download name
        filename: String,
    },
    /// Base64 data URI envelope
    Inline(InlinePdf),
    /// Upload receipt envelope
    Uploaded(UploadedPdf),
}

impl Delivered {
    /// Mode that produced this value
    pub fn mode(&self) -> DeliveryMode {
        match self {
            Delivered::Attachment { .. } => DeliveryMode::Attachment,
            Delivered::Inline(_) => DeliveryMode::InlineBase64,
            Delivered::Uploaded(_) => DeliveryMode::UploadedUrl,
        }
    }

    /// `Content-Disposition` header value for attachments
    pub fn content_disposition(&self) -> Option<String> {
        match self {
            Delivered::Attachment { filename, .. } => {
                Some(format!("attachment; filename={}", filename))
            }
            _ => None,
        }
    }
}

/// Encode PDF bytes as a `data:` URI
pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", PDF_MIME, BASE64.encode(bytes))
}

/// Packages PDF bytes according to the configured [`DeliveryMode`]
#[derive(Clone)]
pub enum DeliveryStrategy {
    /// See [`DeliveryMode::Attachment`]
    Attachment,
    /// See [`DeliveryMode::InlineBase64`]
    InlineBase64,
    /// See [`DeliveryMode::UploadedUrl`]
    Upload {
        /// Storage collaborator
        store: Arc<dyn ObjectStore>,
        /// Filename prefix before the time-based suffix
        prefix: String,
    },
}

impl fmt::Debug for DeliveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStrategy::Upload { prefix, .. } => f
                .debug_struct("Upload")
                .field("prefix", prefix)
                .finish_non_exhaustive(),
            other => f.write_str(other.mode().as_str()),
        }
    }
}

impl DeliveryStrategy {
    /// Upload strategy with the default filename prefix
    pub fn upload(store: Arc<dyn ObjectStore>) -> Self {
        DeliveryStrategy::Upload {
            store,
            prefix: DEFAULT_UPLOAD_PREFIX.to_string(),
        }
    }

    /// Mode tag for this strategy
    pub fn mode(&self) -> DeliveryMode {
        match self {
            DeliveryStrategy::Attachment => DeliveryMode::Attachment,
            DeliveryStrategy::InlineBase64 => DeliveryMode::InlineBase64,
            DeliveryStrategy::Upload { .. } => DeliveryMode::UploadedUrl,
        }
    }

    /// Package `pdf`, consuming it
    #[instrument(skip(self, pdf), fields(mode = %self.mode(), size = pdf.len()))]
    pub async fn deliver(&self, pdf: Vec<u8>) -> Result<Delivered> {
        let delivered = match self {
            DeliveryStrategy::Attachment => Delivered::Attachment {
                bytes: pdf,
                filename: ATTACHMENT_FILENAME.to_string(),
            },
            DeliveryStrategy::InlineBase64 => Delivered::Inline(InlinePdf {
                pdf: data_uri(&pdf),
            }),
            DeliveryStrategy::Upload { store, prefix } => {
                let filename = unique_filename(prefix);
                let receipt = store.upload(pdf, &filename).await?;
                Delivered::Uploaded(UploadedPdf {
                    pdf_url: receipt.url,
                })
            }
        };

        debug!("Delivered as {}", delivered.mode());
        Ok(delivered)
    }
}
