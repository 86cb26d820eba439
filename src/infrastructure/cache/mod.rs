//! Namespaced two-tier cache: a TTL- and capacity-bounded memory tier in
//! front of an unbounded disk tier.

mod disk_tier;
mod memory_tier;
mod namespaced;

pub(crate) use disk_tier::DiskTier;
pub(crate) use memory_tier::MemoryTier;
pub use namespaced::{CacheStats, NamespacedCache};

use crate::domain::entities::ImageId;

/// Composite cache key; distinct namespaces never share entries, even for
/// the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) namespace: String,
    pub(crate) image_id: ImageId,
}
