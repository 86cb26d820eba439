//! Two-tier namespaced payload cache.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::domain::entities::ImageId;
use crate::infrastructure::config::GalleryConfig;

use super::disk_tier::DiskTier;
use super::memory_tier::MemoryTier;
use super::CacheKey;

/// Cache counters reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Bytes currently resident in the memory tier.
    pub memory_bytes_used: u64,
    /// Configured memory budget.
    pub memory_bytes_max: u64,
    /// Entries resident in the memory tier.
    pub entry_count: usize,
    /// Configured memory-tier entry lifetime.
    pub ttl: Duration,
}

/// Read path in front of the image store, partitioned by caller-supplied
/// namespace.
///
/// Every operation is infallible from the caller's point of view: a disk
/// tier fault is logged and swallowed, because the cache is an
/// optimization on top of the authoritative store, never a source of
/// truth. Constructed once at process start and shared; there is no
/// ambient global instance.
pub struct NamespacedCache {
    memory: MemoryTier,
    disk: DiskTier,
}

impl NamespacedCache {
    /// Creates a cache with an explicit budget and TTL, rooted at
    /// `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the disk tier directory cannot be created.
    pub async fn new(cache_dir: PathBuf, max_bytes: u64, ttl: Duration) -> std::io::Result<Self> {
        Ok(Self {
            memory: MemoryTier::new(max_bytes, ttl),
            disk: DiskTier::new(cache_dir).await?,
        })
    }

    /// Creates a cache from the gallery configuration.
    ///
    /// # Errors
    /// Returns an error if the disk tier directory cannot be created.
    pub async fn from_config(config: &GalleryConfig) -> std::io::Result<Self> {
        Self::new(
            config.cache_dir.clone(),
            config.cache_max_bytes(),
            config.cache_ttl(),
        )
        .await
    }

    /// Stores a payload in both tiers.
    ///
    /// The memory insert and its eviction sweep run atomically; the disk
    /// write is best-effort.
    pub async fn put(&self, namespace: &str, image_id: &ImageId, payload: Bytes) {
        let key = CacheKey {
            namespace: namespace.to_string(),
            image_id: image_id.clone(),
        };
        self.memory.put(key, payload.clone());

        if let Err(e) = self.disk.write(namespace, image_id, &payload).await {
            warn!(
                namespace = namespace,
                image_id = %image_id,
                error = %e,
                "Disk tier write failed; entry is memory-only"
            );
        }
    }

    /// Looks a payload up: memory tier first (TTL-bounded), then disk. A
    /// disk hit repopulates the memory tier and counts as a hit.
    pub async fn get(&self, namespace: &str, image_id: &ImageId) -> Option<Bytes> {
        let key = CacheKey {
            namespace: namespace.to_string(),
            image_id: image_id.clone(),
        };

        if let Some(payload) = self.memory.get(&key) {
            return Some(payload);
        }

        let payload = self.disk.read(namespace, image_id).await?;
        self.memory.put(key, payload.clone());
        debug!(
            namespace = namespace,
            image_id = %image_id,
            "Repopulated memory tier from disk"
        );
        Some(payload)
    }

    /// Drops all memory-tier entries for one namespace. The disk tier and
    /// every other namespace are untouched. Returns the number of entries
    /// removed.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        self.memory.clear_namespace(namespace)
    }

    /// Purges an image from both tiers across all namespaces. Used when
    /// the authoritative record is deleted; the deleting caller cannot
    /// know which namespaces cached it.
    pub async fn remove_image(&self, image_id: &ImageId) -> usize {
        let from_memory = self.memory.remove_image(image_id);
        let from_disk = self.disk.remove_image(image_id).await;
        from_memory.max(from_disk)
    }

    /// Returns current cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_bytes_used: self.memory.bytes_used(),
            memory_bytes_max: self.memory.max_bytes(),
            entry_count: self.memory.entry_count(),
            ttl: self.memory.ttl(),
        }
    }
}

impl std::fmt::Debug for NamespacedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedCache")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .finish()
    }
}
