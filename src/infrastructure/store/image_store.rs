//! Authoritative, crash-durable image store.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::entities::{ImageId, ImageRecord, StreamId, Visibility};
use crate::domain::errors::{ImageError, ImageResult};
use crate::domain::ports::ByteStorePort;
use crate::infrastructure::config::GalleryConfig;

use super::thumbnail::{format_extension, process_upload, sniff_format};

/// Store key of the persisted metadata index.
pub const INDEX_KEY: &str = "images_index.json";

/// Per-stream aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records in the stream.
    pub total: usize,
    /// Records with `Public` visibility.
    pub public_count: usize,
    /// Records with `Private` visibility.
    pub private_count: usize,
    /// Records with `Subscribers` visibility.
    pub subscribers_count: usize,
    /// Sum of original asset sizes in bytes.
    pub total_size_bytes: u64,
}

/// Result of a successful upload: the new record plus the thumbnail bytes,
/// returned so the caller can prime its cache without a second read.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The freshly persisted record.
    pub record: ImageRecord,
    /// JPEG thumbnail payload.
    pub thumbnail: Bytes,
}

type Index = HashMap<String, Vec<ImageRecord>>;

/// Single source of truth for image records and their byte assets.
///
/// Index mutation is serialized behind one async mutex; asset bytes are
/// always written before the index entry that references them, and index
/// entries are removed before their assets, so the index stays a subset of
/// reality across a crash at any point.
pub struct ImageStore {
    backend: Arc<dyn ByteStorePort>,
    index: Mutex<Index>,
    config: GalleryConfig,
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageStore {
    /// Opens the store, loading the persisted index and dropping entries
    /// whose assets went missing (crash recovery).
    ///
    /// # Errors
    /// Returns an error if the index exists but cannot be read or parsed.
    pub async fn open(backend: Arc<dyn ByteStorePort>, config: GalleryConfig) -> ImageResult<Self> {
        let mut index: Index = match backend.read(INDEX_KEY).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Index::new(),
            Err(e) => return Err(ImageError::Store(e)),
        };

        // The index must never reference a missing asset; a crash between
        // index write and asset write cannot produce that state, but an
        // operator deleting files out-of-band can.
        let mut dropped = 0usize;
        for records in index.values_mut() {
            let mut kept = Vec::with_capacity(records.len());
            for record in records.drain(..) {
                if backend.exists(&record.original_ref).await {
                    kept.push(record);
                } else {
                    warn!(
                        image_id = %record.image_id,
                        stream_id = %record.stream_id,
                        "Dropping index entry with missing asset"
                    );
                    dropped += 1;
                }
            }
            *records = kept;
        }
        index.retain(|_, records| !records.is_empty());

        let total: usize = index.values().map(Vec::len).sum();
        info!(streams = index.len(), images = total, dropped = dropped, "Opened image store");

        Ok(Self {
            backend,
            index: Mutex::new(index),
            config,
        })
    }

    /// Validates, decodes, and persists one upload.
    ///
    /// # Errors
    /// `SizeLimitExceeded`, `UnsupportedFormat`, `QuotaExceeded`, or
    /// `CorruptImage` for bad input; `Store`/`Index` for backend faults.
    pub async fn put(
        &self,
        stream_id: &StreamId,
        image_bytes: Bytes,
        filename: &str,
        visibility: Visibility,
        title: Option<String>,
        description: Option<String>,
    ) -> ImageResult<UploadOutcome> {
        let size = image_bytes.len() as u64;
        let limit = self.config.max_upload_bytes();
        if image_bytes.is_empty() || size > limit {
            return Err(ImageError::SizeLimitExceeded {
                actual: size,
                limit,
            });
        }

        let format = sniff_format(&image_bytes)
            .ok_or(ImageError::UnsupportedFormat { detected: None })?;
        let extension = format_extension(format);
        if !self.config.is_extension_allowed(extension) {
            return Err(ImageError::UnsupportedFormat {
                detected: Some(extension.to_string()),
            });
        }

        // Cheap rejection before spending CPU on a decode.
        self.check_quota(stream_id).await?;

        // CPU-bound work runs on the blocking pool with no lock held.
        let processed = process_upload(image_bytes.clone(), self.config.decode_timeout()).await?;

        let image_id = ImageId::generate();
        let original_ref = format!(
            "{}/{}/original.{extension}",
            stream_id.as_str(),
            image_id.as_str()
        );
        let thumbnail_ref = format!("{}/{}/thumb.jpg", stream_id.as_str(), image_id.as_str());

        // Assets land before the index entry that references them.
        self.backend.write(&original_ref, &image_bytes).await?;
        self.backend.write(&thumbnail_ref, &processed.thumbnail).await?;

        let record = ImageRecord {
            image_id: image_id.clone(),
            stream_id: stream_id.clone(),
            filename: filename.to_string(),
            visibility,
            title,
            description,
            size_bytes: size,
            dimensions: processed.dimensions,
            original_ref,
            thumbnail_ref,
            view_count: 0,
            created_at: Utc::now(),
            last_accessed: None,
        };

        {
            let mut index = self.index.lock().await;
            // Re-check under the lock: a concurrent upload may have filled
            // the last slot while we were decoding.
            let records = index.entry(stream_id.as_str().to_string()).or_default();
            if records.len() >= self.config.max_images_per_stream {
                drop(index);
                // The assets were never referenced by the index; reclaim them.
                let _ = self.backend.delete(&record.original_ref).await;
                let _ = self.backend.delete(&record.thumbnail_ref).await;
                return Err(ImageError::QuotaExceeded {
                    stream_id: stream_id.as_str().to_string(),
                    limit: self.config.max_images_per_stream,
                });
            }
            records.push(record.clone());
            if let Err(e) = self.save_index(&index).await {
                // The entry never reached the persisted index, so it must
                // not be served from memory either.
                if let Some(records) = index.get_mut(stream_id.as_str()) {
                    records.pop();
                    if records.is_empty() {
                        index.remove(stream_id.as_str());
                    }
                }
                drop(index);
                let _ = self.backend.delete(&record.original_ref).await;
                let _ = self.backend.delete(&record.thumbnail_ref).await;
                return Err(e);
            }
        }

        info!(
            image_id = %image_id,
            stream_id = %stream_id,
            size = size,
            visibility = %visibility,
            "Stored image"
        );

        Ok(UploadOutcome {
            record,
            thumbnail: processed.thumbnail,
        })
    }

    /// Returns the record and original bytes for an image.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown; `Store` on backend faults.
    pub async fn get(&self, image_id: &ImageId) -> ImageResult<(ImageRecord, Bytes)> {
        let record = self.find_record(image_id).await?;
        let bytes = self.backend.read(&record.original_ref).await?;
        Ok((record, bytes))
    }

    /// Returns the thumbnail bytes for an image.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown; `Store` on backend faults.
    pub async fn get_thumbnail(&self, image_id: &ImageId) -> ImageResult<Bytes> {
        let record = self.find_record(image_id).await?;
        Ok(self.backend.read(&record.thumbnail_ref).await?)
    }

    /// Removes a record and both of its assets.
    ///
    /// # Errors
    /// `NotFound` if the image is not in the stream; deleting twice
    /// surfaces `NotFound` the second time.
    pub async fn delete(&self, stream_id: &StreamId, image_id: &ImageId) -> ImageResult<()> {
        let record = {
            let mut index = self.index.lock().await;
            let records = index
                .get_mut(stream_id.as_str())
                .ok_or_else(|| ImageError::NotFound(image_id.clone()))?;
            let pos = records
                .iter()
                .position(|r| &r.image_id == image_id)
                .ok_or_else(|| ImageError::NotFound(image_id.clone()))?;
            let record = records.remove(pos);
            if records.is_empty() {
                index.remove(stream_id.as_str());
            }
            // Index entry disappears before its assets do; a removal that
            // never reaches disk must not take effect in memory either.
            if let Err(e) = self.save_index(&index).await {
                index
                    .entry(stream_id.as_str().to_string())
                    .or_default()
                    .insert(pos, record);
                return Err(e);
            }
            record
        };

        self.backend.delete(&record.original_ref).await?;
        self.backend.delete(&record.thumbnail_ref).await?;

        debug!(image_id = %image_id, stream_id = %stream_id, "Deleted image");
        Ok(())
    }

    /// Lists a stream's records ordered by creation time, oldest first.
    /// Unknown streams yield an empty list.
    pub async fn list(&self, stream_id: &StreamId) -> Vec<ImageRecord> {
        let index = self.index.lock().await;
        let mut records = index
            .get(stream_id.as_str())
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Computes aggregate counters for a stream.
    pub async fn stats(&self, stream_id: &StreamId) -> StoreStats {
        let index = self.index.lock().await;
        let records = index.get(stream_id.as_str());
        let mut stats = StoreStats {
            total: 0,
            public_count: 0,
            private_count: 0,
            subscribers_count: 0,
            total_size_bytes: 0,
        };
        for record in records.into_iter().flatten() {
            stats.total += 1;
            stats.total_size_bytes += record.size_bytes;
            match record.visibility {
                Visibility::Public => stats.public_count += 1,
                Visibility::Private => stats.private_count += 1,
                Visibility::Subscribers => stats.subscribers_count += 1,
            }
        }
        stats
    }

    /// Bumps `view_count` and `last_accessed` on the given records and
    /// persists the index once.
    ///
    /// # Errors
    /// `Store`/`Index` if the index cannot be persisted.
    pub async fn record_access(&self, stream_id: &StreamId, ids: &[ImageId]) -> ImageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut index = self.index.lock().await;
        let Some(records) = index.get_mut(stream_id.as_str()) else {
            return Ok(());
        };
        let previous = records.clone();
        for record in records.iter_mut() {
            if ids.contains(&record.image_id) {
                record.view_count += 1;
                record.last_accessed = Some(now);
            }
        }
        if let Err(e) = self.save_index(&index).await {
            // Counters that never reached disk are rolled back in memory.
            index.insert(stream_id.as_str().to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// Applies an explicit metadata edit; `None` fields are left untouched.
    ///
    /// # Errors
    /// `NotFound` if the image is not in the stream.
    pub async fn update_metadata(
        &self,
        stream_id: &StreamId,
        image_id: &ImageId,
        title: Option<String>,
        description: Option<String>,
        visibility: Option<Visibility>,
    ) -> ImageResult<ImageRecord> {
        let mut index = self.index.lock().await;
        let records = index
            .get_mut(stream_id.as_str())
            .ok_or_else(|| ImageError::NotFound(image_id.clone()))?;
        let record = records
            .iter_mut()
            .find(|r| &r.image_id == image_id)
            .ok_or_else(|| ImageError::NotFound(image_id.clone()))?;

        let previous = record.clone();
        if let Some(title) = title {
            record.title = Some(title);
        }
        if let Some(description) = description {
            record.description = Some(description);
        }
        if let Some(visibility) = visibility {
            record.visibility = visibility;
        }
        let updated = record.clone();
        if let Err(e) = self.save_index(&index).await {
            // An edit that never reached disk is rolled back in memory.
            if let Some(slot) = index
                .get_mut(stream_id.as_str())
                .and_then(|records| records.iter_mut().find(|r| &r.image_id == image_id))
            {
                *slot = previous;
            }
            return Err(e);
        }

        debug!(image_id = %image_id, "Updated image metadata");
        Ok(updated)
    }

    async fn check_quota(&self, stream_id: &StreamId) -> ImageResult<()> {
        let index = self.index.lock().await;
        let count = index.get(stream_id.as_str()).map_or(0, Vec::len);
        if count >= self.config.max_images_per_stream {
            return Err(ImageError::QuotaExceeded {
                stream_id: stream_id.as_str().to_string(),
                limit: self.config.max_images_per_stream,
            });
        }
        Ok(())
    }

    async fn find_record(&self, image_id: &ImageId) -> ImageResult<ImageRecord> {
        let index = self.index.lock().await;
        index
            .values()
            .flatten()
            .find(|r| &r.image_id == image_id)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(image_id.clone()))
    }

    async fn save_index(&self, index: &Index) -> ImageResult<()> {
        let bytes = serde_json::to_vec_pretty(index)?;
        self.backend.write(INDEX_KEY, &bytes).await?;
        Ok(())
    }
}
