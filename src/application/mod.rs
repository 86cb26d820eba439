//! Application layer: the public-facing image manager.

mod manager;

pub use manager::{ImageManager, ImageStats};
