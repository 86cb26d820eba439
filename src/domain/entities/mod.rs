//! Domain entity definitions.

mod image;

pub use image::{Dimensions, ImageId, ImageRecord, ResolvedImage, StreamId, Visibility};
