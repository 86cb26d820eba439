//! Domain layer: entities, errors, and port definitions.

pub mod entities;
pub mod errors;
pub mod ports;
