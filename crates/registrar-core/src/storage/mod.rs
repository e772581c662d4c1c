//! # Storage Backends
//!
//! Persistent implementations of [`RecordStore`](crate::RecordStore).

pub mod redb_store;

pub use redb_store::RedbStore;
