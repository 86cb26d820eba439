//! Durable image persistence: filesystem backend, decode pipeline, and the
//! authoritative image store.

mod filesystem;
mod image_store;
mod thumbnail;

pub use filesystem::FsByteStore;
pub use image_store::{ImageStore, StoreStats, UploadOutcome, INDEX_KEY};
pub use thumbnail::{
    process_upload, sniff_format, ProcessedUpload, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_MAX_DIM,
};
