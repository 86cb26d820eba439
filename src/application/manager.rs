//! Orchestrator for uploads, access-controlled reads, and cache priming.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument};

use crate::domain::entities::{ImageId, ImageRecord, ResolvedImage, StreamId, Visibility};
use crate::domain::errors::ImageResult;
use crate::infrastructure::cache::{CacheStats, NamespacedCache};
use crate::infrastructure::store::ImageStore;

/// Aggregate statistics for one stream's gallery.
#[derive(Debug, Clone)]
pub struct ImageStats {
    /// Total number of images.
    pub total: usize,
    /// Images with `Public` visibility.
    pub public_count: usize,
    /// Images with `Private` visibility (the reserved `Subscribers` state
    /// is counted separately in the store, not here).
    pub private_count: usize,
    /// Total original size in megabytes, rounded to two decimals.
    pub total_size_mb: f64,
    /// The record with the highest view count, if any images exist.
    pub most_viewed: Option<ImageRecord>,
}

/// The single entry point external callers touch.
///
/// Composes the durable store and the namespaced cache, enforcing
/// visibility on every read. Construct one instance at process start and
/// share it; both collaborators are injected rather than reached through
/// globals.
pub struct ImageManager {
    store: Arc<ImageStore>,
    cache: Arc<NamespacedCache>,
}

impl ImageManager {
    /// Creates a manager over an opened store and cache.
    #[must_use]
    pub fn new(store: Arc<ImageStore>, cache: Arc<NamespacedCache>) -> Self {
        Self { store, cache }
    }

    /// Ingests one upload and primes the caller's namespace with the new
    /// thumbnail payload. Store errors propagate unchanged.
    ///
    /// # Errors
    /// `SizeLimitExceeded`, `UnsupportedFormat`, `CorruptImage`,
    /// `QuotaExceeded`, or a `Store` fault.
    #[instrument(skip(self, image_bytes), fields(size = image_bytes.len()))]
    pub async fn upload_stream_image(
        &self,
        stream_id: &StreamId,
        image_bytes: Bytes,
        filename: &str,
        visibility: Visibility,
        title: Option<String>,
        description: Option<String>,
        namespace: &str,
    ) -> ImageResult<ImageId> {
        let outcome = self
            .store
            .put(stream_id, image_bytes, filename, visibility, title, description)
            .await?;

        let image_id = outcome.record.image_id.clone();
        self.cache
            .put(namespace, &image_id, outcome.thumbnail)
            .await;

        info!(image_id = %image_id, namespace = namespace, "Upload complete, cache primed");
        Ok(image_id)
    }

    /// Returns the stream's visible images with resolved display payloads.
    ///
    /// Non-owners see only `Public` records; `Private` and `Subscribers`
    /// records are silently filtered, never errored, so their existence
    /// does not leak. Every resolved read bumps the authoritative view
    /// accounting, cache hit or not.
    ///
    /// # Errors
    /// A `Store` fault while resolving payloads or persisting the view
    /// accounting.
    #[instrument(skip(self))]
    pub async fn get_stream_images(
        &self,
        stream_id: &StreamId,
        caller_id: &str,
        is_owner: bool,
        namespace: &str,
    ) -> ImageResult<Vec<ResolvedImage>> {
        let records = self.store.list(stream_id).await;

        let visible: Vec<ImageRecord> = records
            .into_iter()
            .filter(|r| is_owner || r.visible_to_viewer())
            .collect();

        let mut resolved = Vec::with_capacity(visible.len());
        for record in visible {
            let payload = match self.cache.get(namespace, &record.image_id).await {
                Some(payload) => payload,
                None => {
                    // Full cache miss: fall back to the store and
                    // repopulate so the next read is cheap.
                    let payload = self.store.get_thumbnail(&record.image_id).await?;
                    self.cache
                        .put(namespace, &record.image_id, payload.clone())
                        .await;
                    payload
                }
            };
            resolved.push(ResolvedImage { record, payload });
        }

        // View accounting is independent of cache state.
        let ids: Vec<ImageId> = resolved.iter().map(|r| r.record.image_id.clone()).collect();
        self.store.record_access(stream_id, &ids).await?;
        let now = chrono::Utc::now();
        for image in &mut resolved {
            image.record.view_count += 1;
            image.record.last_accessed = Some(now);
        }

        debug!(
            caller_id = caller_id,
            is_owner = is_owner,
            returned = resolved.len(),
            "Resolved stream images"
        );
        Ok(resolved)
    }

    /// Deletes an image everywhere: the authoritative record, both byte
    /// assets, and every cache entry in every namespace.
    ///
    /// # Errors
    /// `NotFound` if the image is not in the stream.
    #[instrument(skip(self))]
    pub async fn delete_stream_image(
        &self,
        stream_id: &StreamId,
        image_id: &ImageId,
    ) -> ImageResult<()> {
        self.store.delete(stream_id, image_id).await?;
        self.cache.remove_image(image_id).await;
        Ok(())
    }

    /// Computes gallery statistics for a stream.
    #[allow(clippy::cast_precision_loss)]
    pub async fn get_image_stats(&self, stream_id: &StreamId) -> ImageStats {
        let stats = self.store.stats(stream_id).await;
        let most_viewed = self
            .store
            .list(stream_id)
            .await
            .into_iter()
            .max_by_key(|r| r.view_count);

        ImageStats {
            total: stats.total,
            public_count: stats.public_count,
            private_count: stats.private_count,
            total_size_mb: (stats.total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round()
                / 100.0,
            most_viewed,
        }
    }

    /// Applies an explicit metadata edit to one record.
    ///
    /// # Errors
    /// `NotFound` if the image is not in the stream.
    pub async fn update_image_metadata(
        &self,
        stream_id: &StreamId,
        image_id: &ImageId,
        title: Option<String>,
        description: Option<String>,
        visibility: Option<Visibility>,
    ) -> ImageResult<ImageRecord> {
        self.store
            .update_metadata(stream_id, image_id, title, description, visibility)
            .await
    }

    /// Drops one namespace's memory-tier cache entries.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        self.cache.clear_namespace(namespace)
    }

    /// Returns current cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageManager").finish_non_exhaustive()
    }
}
