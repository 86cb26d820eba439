//! Domain types for stored stream images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a stored image.
/// Generated once at upload time and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Creates a new `ImageId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier of the stream that owns a set of images.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    /// Creates a new `StreamId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Access-control classification of an image.
///
/// `Subscribers` is accepted and persisted but is currently filtered the
/// same as `Private` on the read path; only `Public` is visible to
/// non-owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to every viewer.
    #[default]
    Public,
    /// Visible to the stream owner only.
    Private,
    /// Reserved for paying members; not yet distinguished from `Private`.
    Subscribers,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Subscribers => write!(f, "subscribers"),
        }
    }
}

/// Pixel dimensions of the original asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Authoritative metadata for one stored image.
///
/// Owned exclusively by the durable store; cached payloads are non-owning
/// copies of the rendered bytes, never of this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique image identifier; storage addressing uses this, never the
    /// caller-supplied filename.
    pub image_id: ImageId,
    /// Owning stream.
    pub stream_id: StreamId,
    /// Original filename, kept for display only.
    pub filename: String,
    /// Access-control classification.
    pub visibility: Visibility,
    /// Optional caller-supplied title.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional caller-supplied description.
    #[serde(default)]
    pub description: Option<String>,
    /// Byte length of the original asset.
    pub size_bytes: u64,
    /// Pixel dimensions of the original.
    pub dimensions: Dimensions,
    /// Storage key of the original asset.
    pub original_ref: String,
    /// Storage key of the derived thumbnail.
    pub thumbnail_ref: String,
    /// Monotonically increasing read counter.
    #[serde(default)]
    pub view_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent successful read.
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// Returns true if this record may be shown to a non-owner.
    #[must_use]
    pub fn visible_to_viewer(&self) -> bool {
        // Subscribers intentionally falls through to the private branch
        // until membership checks exist.
        matches!(self.visibility, Visibility::Public)
    }
}

/// An image record together with its resolved display payload.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// The authoritative record at the time of the read.
    pub record: ImageRecord,
    /// Rendered display bytes (thumbnail payload).
    pub payload: bytes::Bytes,
}
