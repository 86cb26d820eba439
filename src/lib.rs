//! streamgallery - Access-controlled image store with a namespaced
//! two-tier cache.
//!
//! This crate ingests uploaded images for a parent stream, derives
//! thumbnails, enforces owner/viewer visibility at read time, and serves
//! repeated reads from a TTL- and capacity-bounded memory tier backed by a
//! durable disk tier, all in front of an authoritative byte store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamgallery::application::ImageManager;
//! use streamgallery::infrastructure::cache::NamespacedCache;
//! use streamgallery::infrastructure::config::GalleryConfig;
//! use streamgallery::infrastructure::store::{FsByteStore, ImageStore};
//!
//! # async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GalleryConfig::default();
//! config.validate()?;
//!
//! let backend = Arc::new(FsByteStore::new(config.images_dir.clone()).await?);
//! let store = Arc::new(ImageStore::open(backend, config.clone()).await?);
//! let cache = Arc::new(NamespacedCache::from_config(&config).await?);
//!
//! let manager = ImageManager::new(store, cache);
//! # let _ = manager;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the image manager.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing config, storage, and caching.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "streamgallery";
