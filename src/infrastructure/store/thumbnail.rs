//! Decode and thumbnail pipeline for uploads.

use std::time::Duration;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::domain::entities::Dimensions;
use crate::domain::errors::{ImageError, ImageResult};

/// Bounding box for derived thumbnails; aspect ratio is preserved.
pub const THUMBNAIL_MAX_DIM: u32 = 200;

/// JPEG quality used when re-encoding thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

/// Result of decoding an upload: the measured dimensions and the derived
/// thumbnail, re-encoded as JPEG.
#[derive(Debug)]
pub struct ProcessedUpload {
    /// Pixel size of the original.
    pub dimensions: Dimensions,
    /// JPEG-encoded thumbnail bytes.
    pub thumbnail: Bytes,
}

/// Sniffs the image format from content bytes, independent of the
/// caller-supplied filename.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Returns the canonical file extension for a sniffed format.
#[must_use]
pub fn format_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Decodes an upload and derives its thumbnail on the blocking pool.
///
/// The whole decode is bounded by `timeout`; a pathological image that
/// stalls the decoder fails with `CorruptImage` instead of hanging the
/// process. No lock is held while this runs.
///
/// # Errors
/// Returns `CorruptImage` if the bytes do not decode, the encoder fails,
/// or the bound is exceeded.
pub async fn process_upload(bytes: Bytes, timeout: Duration) -> ImageResult<ProcessedUpload> {
    let task = tokio::task::spawn_blocking(move || decode_and_thumbnail(&bytes));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "Decode task panicked");
            Err(ImageError::CorruptImage(format!(
                "decode task panicked: {join_err}"
            )))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Decode timed out");
            Err(ImageError::CorruptImage(format!(
                "decode exceeded {}s bound",
                timeout.as_secs()
            )))
        }
    }
}

fn decode_and_thumbnail(bytes: &[u8]) -> ImageResult<ProcessedUpload> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ImageError::CorruptImage(format!("failed to decode image: {e}")))?;

    let dimensions = Dimensions {
        width: decoded.width(),
        height: decoded.height(),
    };

    let thumb = decoded.thumbnail(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM);
    // JPEG has no alpha channel; flatten before encoding.
    let thumb = DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, THUMBNAIL_JPEG_QUALITY);
    thumb
        .write_with_encoder(encoder)
        .map_err(|e| ImageError::CorruptImage(format!("failed to encode thumbnail: {e}")))?;

    debug!(
        original = %dimensions,
        thumb_width = thumb.width(),
        thumb_height = thumb.height(),
        thumb_bytes = encoded.len(),
        "Derived thumbnail"
    );

    Ok(ProcessedUpload {
        dimensions,
        thumbnail: Bytes::from(encoded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::fixtures::png_bytes;

    #[test]
    fn test_sniff_png() {
        let bytes = png_bytes(4, 4);
        assert_eq!(sniff_format(&bytes), Some(ImageFormat::Png));
        assert_eq!(format_extension(ImageFormat::Png), "png");
    }

    #[test]
    fn test_sniff_garbage_is_none() {
        assert_eq!(sniff_format(b"definitely not an image"), None);
    }

    #[tokio::test]
    async fn test_process_reports_dimensions() {
        let bytes = png_bytes(320, 240);
        let processed = process_upload(bytes, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(processed.dimensions.width, 320);
        assert_eq!(processed.dimensions.height, 240);
        assert!(!processed.thumbnail.is_empty());
        // Thumbnail payload must itself be a decodable JPEG.
        assert_eq!(
            sniff_format(&processed.thumbnail),
            Some(ImageFormat::Jpeg)
        );
    }

    #[tokio::test]
    async fn test_thumbnail_fits_bounding_box() {
        let bytes = png_bytes(800, 400);
        let processed = process_upload(bytes, Duration::from_secs(10))
            .await
            .unwrap();

        let thumb = image::load_from_memory(&processed.thumbnail).unwrap();
        assert!(thumb.width() <= THUMBNAIL_MAX_DIM);
        assert!(thumb.height() <= THUMBNAIL_MAX_DIM);
        // Aspect ratio preserved: 2:1 input stays 2:1.
        assert_eq!(thumb.width(), 200);
        assert_eq!(thumb.height(), 100);
    }

    #[tokio::test]
    async fn test_corrupt_bytes_fail_decode() {
        let err = process_upload(Bytes::from_static(b"garbage"), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::CorruptImage(_)));
    }
}
