//! # Formats
//!
//! Binary snapshot encoding. File I/O stays in the app layer.

pub mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_SIZE, PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes,
};
