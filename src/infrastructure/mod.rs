//! Infrastructure layer: configuration, durable storage, and caching.

pub mod cache;
pub mod config;
pub mod store;
