//! Port definitions for external collaborators.

mod byte_store_port;

pub use byte_store_port::ByteStorePort;

#[cfg(test)]
pub use byte_store_port::MockByteStorePort;
