//! OAuth provider integration for the social login handoff.
//!
//! Providers are described by the application configuration
//! ([`handoff_core::IdentityProvider`]); this crate turns an authorization code
//! into a [`handoff_core::NormalizedProfile`] for any of them.

#![warn(missing_docs)]

pub mod errors;
pub mod exchanger;
pub mod oauth;

pub use errors::{ProviderError, Result};
pub use exchanger::OAuthProfileExchanger;
pub use oauth::{OAuthClient, OAuthConfig, OAuthTokenResponse, OAuthUserInfo};
