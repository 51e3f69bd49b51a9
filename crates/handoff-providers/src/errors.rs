//! Provider error types.

use thiserror::Error;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider entry is missing endpoints or has malformed URLs
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// Token endpoint rejected the exchange or was unreachable
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// User info endpoint failed or returned an unusable profile
    #[error("User info request failed: {0}")]
    UserInfo(String),
}

impl From<ProviderError> for handoff_core::HandoffError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::InvalidConfig(msg) => handoff_core::HandoffError::ProviderNotFound(msg),
            other => handoff_core::HandoffError::ProfileFetchFailed(other.to_string()),
        }
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
