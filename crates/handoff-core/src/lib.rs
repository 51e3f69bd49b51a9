//! # handoff-core
//!
//! Cross-device social login handoff.
//!
//! A browser completes the OAuth2 dance with an external identity provider while
//! a launcher, which cannot receive redirects, polls or subscribes for the result.
//! Both sides are correlated by the login challenge issued by the external
//! authorization server.
//!
//! - [`TokenStore`]: ephemeral key to payload store with TTL and consume-once reads
//! - [`LauncherSessionStore`]: challenge-keyed session state machine with atomic transitions
//! - [`SocialIdentityResolver`]: provider exchange and local identity mapping
//! - [`Notifier`]: push of status changes per challenge
//! - [`HandoffController`]: orchestration of forward, callback, confirm, check, cancel and complete-auth

pub mod controller;
pub mod errors;
pub mod launcher;
pub mod notifier;
pub mod resolver;
pub mod stores;
pub mod tokens;
pub mod traits;
pub mod types;
pub mod utils;


pub use controller::HandoffController;
pub use errors::*;
pub use launcher::{LauncherSessionStore, LAUNCHER_SESSION_TTL};
pub use notifier::{BroadcastNotifier, FanoutNotifier};
pub use resolver::{complete_auth_url, Collaborators, ResolverSettings, SocialIdentityResolver};
pub use stores::*;
pub use tokens::TokenStore;
pub use traits::*;
pub use types::*;
pub use utils::{current_timestamp, hash_for_log};
