//! # handoff-storage
//!
//! Storage abstraction layer for the social login handoff service.
//!
//! Entries may carry a time-to-live. Expired entries are invisible to reads and
//! are physically removed by [`Storage::purge_expired`]. The write primitives
//! `insert_if_absent`, `compare_and_swap` and `take` are atomic with respect to
//! every other write on the same storage handle.

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod rocksdb_impl;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use rocksdb_impl::RocksDbStorage;
pub use traits::{CasOutcome, Storage};
