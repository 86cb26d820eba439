//! Port definition for the durable byte-store backend.

use bytes::Bytes;

/// Abstract durable key/value byte store.
///
/// The image store issues every asset and index write through this port;
/// the concrete backend (local filesystem, remote bucket) is an external
/// collaborator. Implementations must be thread-safe, and `write` must be
/// atomic per key: a crash mid-write may lose the new value but never
/// leaves a torn one behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ByteStorePort: Send + Sync {
    /// Writes `bytes` under `key`, replacing any previous value.
    async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()>;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    /// Returns `NotFound` if the key does not exist.
    async fn read(&self, key: &str) -> std::io::Result<Bytes>;

    /// Deletes the value under `key`. Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> std::io::Result<()>;

    /// Returns true if `key` currently holds a value.
    async fn exists(&self, key: &str) -> bool;
}
