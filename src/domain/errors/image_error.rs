//! Error taxonomy for the image store and manager.

use thiserror::Error;

use crate::domain::entities::ImageId;

/// Result type for store and manager operations.
pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// Errors surfaced by uploads, reads, and deletes.
///
/// Upload-path variants indicate a bad input and are never retried
/// automatically. Access denial is not an error: unauthorized reads are
/// silently filtered so a caller cannot distinguish "doesn't exist" from
/// "exists but private".
#[derive(Debug, Error)]
pub enum ImageError {
    /// Upload was empty or exceeded the configured maximum size.
    #[error("image size {actual} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Size of the rejected upload.
        actual: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Content is not one of the allowed image formats.
    #[error("unsupported image format{}", .detected.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    UnsupportedFormat {
        /// Format sniffed from the content, if recognizable at all.
        detected: Option<String>,
    },

    /// Bytes could not be decoded as an image, or decoding timed out.
    #[error("corrupt image: {0}")]
    CorruptImage(String),

    /// The stream already holds the maximum number of images.
    #[error("stream {stream_id} reached its quota of {limit} images")]
    QuotaExceeded {
        /// Stream that hit the ceiling.
        stream_id: String,
        /// Configured per-stream maximum.
        limit: usize,
    },

    /// No record exists for the given image id.
    #[error("image not found: {0}")]
    NotFound(ImageId),

    /// Byte-store backend failure.
    #[error("store error: {0}")]
    Store(#[from] std::io::Error),

    /// The persisted index could not be serialized or parsed.
    #[error("index error: {0}")]
    Index(#[from] serde_json::Error),
}
