//! Shared query parameters and parsing helpers.

use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeQuery {
    #[serde(default)]
    pub login_challenge: String,
}

impl ChallengeQuery {
    /// The challenge, rejecting requests that omit it
    pub fn challenge(&self) -> Result<&str, ApiError> {
        if self.login_challenge.is_empty() {
            return Err(ApiError::InvalidRequest(
                "missing login_challenge".to_string(),
            ));
        }
        Ok(&self.login_challenge)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ForwardQuery {
    #[serde(default)]
    pub login_challenge: String,
    #[serde(default)]
    pub launcher: Option<String>,
}

impl ForwardQuery {
    pub fn is_launcher(&self) -> bool {
        parse_flag(self.launcher.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

/// Query flags are set by `true` or `1`
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}
