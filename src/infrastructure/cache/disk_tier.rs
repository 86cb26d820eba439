//! Durable backup tier for cached payloads.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::entities::ImageId;

const ENTRY_EXTENSION: &str = "img";

/// Disk tier: one file per `(namespace, image_id)`, not bounded by the
/// memory budget and not subject to the TTL. Eviction from memory never
/// touches this tier, so an evicted payload is always recoverable here
/// before falling back to the authoritative store.
pub struct DiskTier {
    cache_dir: PathBuf,
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

impl DiskTier {
    /// Creates the tier rooted at `cache_dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn new(cache_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&cache_dir).await?;
        Ok(Self { cache_dir })
    }

    /// Returns the tier's root directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    // Both key parts are hashed into the filename: namespaces are
    // caller-supplied strings that may not be path-safe, and the image-id
    // suffix lets `remove_image` find entries across all namespaces with a
    // directory scan.
    fn entry_path(&self, namespace: &str, image_id: &ImageId) -> PathBuf {
        self.cache_dir.join(format!(
            "{}_{}.{ENTRY_EXTENSION}",
            short_hash(namespace),
            short_hash(image_id.as_str()),
        ))
    }

    /// Persists a payload. Failures are for the caller to log and swallow;
    /// this tier is an optimization, never a durability guarantee.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn write(&self, namespace: &str, image_id: &ImageId, payload: &[u8]) -> io::Result<()> {
        let path = self.entry_path(namespace, image_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(payload).await?;
        file.flush().await?;
        debug!(
            namespace = namespace,
            image_id = %image_id,
            size = payload.len(),
            "Wrote disk tier entry"
        );
        Ok(())
    }

    /// Reads a payload back, or `None` if absent or unreadable.
    pub async fn read(&self, namespace: &str, image_id: &ImageId) -> Option<Bytes> {
        let path = self.entry_path(namespace, image_id);
        match fs::read(&path).await {
            Ok(data) => {
                trace!(namespace = namespace, image_id = %image_id, "Disk tier hit");
                Some(Bytes::from(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(namespace = namespace, image_id = %image_id, error = %e, "Disk tier read failed");
                None
            }
        }
    }

    /// Returns true if an entry exists for the key.
    pub async fn contains(&self, namespace: &str, image_id: &ImageId) -> bool {
        fs::try_exists(self.entry_path(namespace, image_id))
            .await
            .unwrap_or(false)
    }

    /// Removes the image's entries from every namespace.
    /// Returns the number of files removed.
    pub async fn remove_image(&self, image_id: &ImageId) -> usize {
        let suffix = format!("_{}.{ENTRY_EXTENSION}", short_hash(image_id.as_str()));
        let mut removed = 0usize;

        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(&suffix) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove disk tier entry");
                }
            }
        }

        if removed > 0 {
            debug!(image_id = %image_id, removed = removed, "Purged image from disk tier");
        }
        removed
    }
}

impl std::fmt::Debug for DiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTier")
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_tier() -> (DiskTier, TempDir) {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path().to_path_buf()).await.unwrap();
        (tier, temp)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (tier, _temp) = create_tier().await;
        let id = ImageId::new("img-1");

        tier.write("gallery", &id, b"payload").await.unwrap();

        assert_eq!(tier.read("gallery", &id).await.unwrap(), Bytes::from_static(b"payload"));
        assert!(tier.contains("gallery", &id).await);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (tier, _temp) = create_tier().await;
        let id = ImageId::new("img-1");

        tier.write("a", &id, b"for-a").await.unwrap();

        assert!(tier.read("b", &id).await.is_none());
    }

    #[tokio::test]
    async fn test_unsafe_namespace_strings_are_fine() {
        let (tier, _temp) = create_tier().await;
        let id = ImageId::new("img-1");

        tier.write("../../etc: bad page?", &id, b"x").await.unwrap();
        assert!(tier.read("../../etc: bad page?", &id).await.is_some());
    }

    #[tokio::test]
    async fn test_remove_image_spans_namespaces() {
        let (tier, _temp) = create_tier().await;
        let id = ImageId::new("img-1");
        let other = ImageId::new("img-2");

        tier.write("a", &id, b"x").await.unwrap();
        tier.write("b", &id, b"y").await.unwrap();
        tier.write("b", &other, b"z").await.unwrap();

        assert_eq!(tier.remove_image(&id).await, 2);
        assert!(!tier.contains("a", &id).await);
        assert!(!tier.contains("b", &id).await);
        assert!(tier.contains("b", &other).await);
    }

    #[tokio::test]
    async fn test_missing_entry_is_none() {
        let (tier, _temp) = create_tier().await;
        assert!(tier.read("ns", &ImageId::new("ghost")).await.is_none());
    }
}
