//! OAuth 2.0 authorization code flow against a configured identity provider.
//!
//! The provider endpoints come from the application's [`IdentityProvider`] entry,
//! so a single client serves every provider. Access tokens are handed back to the
//! caller and never persisted here.

use crate::errors::*;
use handoff_core::IdentityProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::{form_urlencoded, Url};

/// Placeholder substituted with the access token in user info URLs that expect
/// it as a query parameter instead of a bearer header
pub const ACCESS_TOKEN_PLACEHOLDER: &str = "{access_token}";

/// OAuth configuration for a provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token exchange endpoint
    pub token_url: String,
    /// User info endpoint
    pub user_info_url: String,
    /// Redirect URI
    pub redirect_uri: String,
    /// Scopes to request
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Build the configuration for `provider` as served from `domain`
    ///
    /// The redirect URI points at the provider callback route on `domain`.
    pub fn from_provider(provider: &IdentityProvider, domain: &str) -> Result<Self> {
        if !provider.is_social() {
            return Err(ProviderError::InvalidConfig(format!(
                "{} is not a social provider",
                provider.name
            )));
        }

        let missing = [
            ("client id", &provider.client_id),
            ("authorization endpoint", &provider.endpoint_auth_url),
            ("token endpoint", &provider.endpoint_token_url),
            ("user info endpoint", &provider.endpoint_userinfo_url),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        if let Some((field, _)) = missing {
            return Err(ProviderError::InvalidConfig(format!(
                "{} has no {}",
                provider.name, field
            )));
        }

        Ok(Self {
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            auth_url: provider.endpoint_auth_url.clone(),
            token_url: provider.endpoint_token_url.clone(),
            user_info_url: provider.endpoint_userinfo_url.clone(),
            redirect_uri: callback_url(domain, &provider.name),
            scopes: provider.client_scopes.clone(),
        })
    }
}

/// Callback route the provider redirects the browser back to
pub fn callback_url(domain: &str, provider: &str) -> String {
    format!(
        "{}/api/providers/{}/callback",
        domain.trim_end_matches('/'),
        provider
    )
}

/// OAuth token response from provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    /// Access token from OAuth provider
    pub access_token: String,
    /// Token type (typically "Bearer")
    #[serde(default)]
    pub token_type: String,
    /// Optional refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token expiry time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Optional OIDC ID token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// User information returned by a provider, reduced to the common fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthUserInfo {
    /// Provider's user ID
    pub id: String,
    /// Email, when the provider shares it
    pub email: Option<String>,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub picture: Option<String>,
}

/// OAuth client for provider interactions
pub struct OAuthClient {
    http_client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
        }
    }

    /// Create a client whose requests fail after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Build authorization URL
    pub fn build_auth_url(&self, config: &OAuthConfig, state: &str) -> Result<String> {
        let mut url = Url::parse(&config.auth_url)
            .map_err(|e| ProviderError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Exchange authorization code for access token
    pub async fn exchange_code(
        &self,
        config: &OAuthConfig,
        code: &str,
    ) -> Result<OAuthTokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &config.redirect_uri);
        params.insert("client_id", &config.client_id);
        params.insert("client_secret", &config.client_secret);

        let response = self
            .http_client
            .post(&config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::TokenExchange(format!(
                "status {}: {}",
                status, body
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            ProviderError::TokenExchange(format!("failed to parse token response: {}", e))
        })?;

        if token_response.access_token.is_empty() {
            return Err(ProviderError::TokenExchange(
                "empty access token".to_string(),
            ));
        }

        Ok(token_response)
    }

    /// Get user info from provider
    pub async fn get_user_info(
        &self,
        config: &OAuthConfig,
        access_token: &str,
    ) -> Result<OAuthUserInfo> {
        let request = if config.user_info_url.contains(ACCESS_TOKEN_PLACEHOLDER) {
            self.http_client
                .get(user_info_url(&config.user_info_url, access_token))
        } else {
            self.http_client
                .get(&config.user_info_url)
                .bearer_auth(access_token)
        };

        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::UserInfo(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UserInfo(format!(
                "status {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::UserInfo(format!("failed to parse user info: {}", e)))?;

        parse_user_info(&json)
    }
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Substitute the access token into a user info URL template
pub fn user_info_url(template: &str, access_token: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(access_token.as_bytes()).collect();
    template.replace(ACCESS_TOKEN_PLACEHOLDER, &encoded)
}

/// Extract the common profile fields from a provider's user info document
///
/// Providers disagree on field names: the id may be `id`, `sub`, `account_id`
/// or `_id` and may be numeric; some wrap the user in a `data` object.
pub fn parse_user_info(json: &serde_json::Value) -> Result<OAuthUserInfo> {
    let user = match json.get("data") {
        Some(serde_json::Value::Object(_)) => &json["data"],
        Some(serde_json::Value::Array(users)) if !users.is_empty() => &users[0],
        _ => json,
    };

    let id = ["id", "sub", "account_id", "_id"]
        .iter()
        .find_map(|field| match user.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| ProviderError::UserInfo("missing user ID".to_string()))?;

    let email = string_field(user, &["email"]);
    let name = string_field(user, &["name", "display_name", "displayName", "login"])
        .unwrap_or_default();
    let picture = string_field(user, &["picture", "avatar", "avatar_url", "logo"]);

    Ok(OAuthUserInfo {
        id,
        email,
        name,
        picture,
    })
}

fn string_field(user: &serde_json::Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        user.get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}
