//! Storage-backed implementations of the collaborator traits.

mod applications;
mod auth_log;
mod identities;

pub use applications::{CachedApplicationDirectory, StorageApplicationDirectory};
pub use auth_log::StorageAuthLog;
pub use identities::StorageIdentityStore;
