//! Local filesystem byte-store backend.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::domain::ports::ByteStorePort;

/// Byte store rooted at a local directory.
///
/// Keys are slash-separated relative paths. Writes are staged next to the
/// target and renamed into place, so a reader never observes a torn value.
pub struct FsByteStore {
    base_dir: PathBuf,
}

impl FsByteStore {
    /// Creates a store rooted at `base_dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn new(base_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid store key: {key:?}"),
            ));
        }
        Ok(self.base_dir.join(key))
    }
}

impl std::fmt::Debug for FsByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsByteStore")
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[async_trait::async_trait]
impl ByteStorePort for FsByteStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Stage in the same directory so the rename stays on one filesystem.
        let staging = path.with_extension(format!(
            "{}.tmp",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("staged")
        ));

        let mut file = fs::File::create(&staging).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&staging, &path).await?;
        debug!(key = key, size = bytes.len(), "Wrote store key");
        Ok(())
    }

    async fn read(&self, key: &str) -> io::Result<Bytes> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).await?;
        trace!(key = key, size = data.len(), "Read store key");
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted store key");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_store() -> (FsByteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FsByteStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (store, _temp) = create_store().await;

        store.write("s1/img/original.png", b"payload").await.unwrap();
        let data = store.read("s1/img/original.png").await.unwrap();

        assert_eq!(&data[..], b"payload");
        assert!(store.exists("s1/img/original.png").await);
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let (store, _temp) = create_store().await;

        let err = store.read("nothing/here").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = create_store().await;

        store.write("s1/a", b"x").await.unwrap();
        store.delete("s1/a").await.unwrap();
        assert!(!store.exists("s1/a").await);

        // Second delete of a missing key is a no-op.
        store.delete("s1/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (store, _temp) = create_store().await;

        store.write("k", b"old").await.unwrap();
        store.write("k", b"new").await.unwrap();

        assert_eq!(&store.read("k").await.unwrap()[..], b"new");
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (store, _temp) = create_store().await;

        for key in ["../escape", "/abs", "a//b", ""] {
            let err = store.write(key, b"x").await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "key {key:?}");
        }
    }

    #[tokio::test]
    async fn test_no_staging_leftovers() {
        let (store, temp) = create_store().await;

        store.write("s1/img/thumb.jpg", b"bytes").await.unwrap();

        let mut leftovers = 0;
        for entry in walk(temp.path()) {
            if entry.to_string_lossy().ends_with(".tmp") {
                leftovers += 1;
            }
        }
        assert_eq!(leftovers, 0);
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    out.push(path);
                }
            }
        }
        out
    }
}
