//! Type definitions for the social login handoff.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HandoffError, Result};
use crate::utils::current_timestamp;

/// Name of the password provider every application carries for email accounts
pub const DEFAULT_PASSWORD_PROVIDER: &str = "initial";

/// Default lifetime of a one-time link token (seconds)
pub const DEFAULT_LINK_TOKEN_TTL_SECONDS: u64 = 3600;

/// Kind of identity provider configured on an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Password,
    Social,
}

/// Identity provider entry configured on an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
    pub id: String,

    /// Name used in routes, e.g. "google"
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    pub kind: ProviderKind,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub client_scopes: Vec<String>,

    #[serde(default)]
    pub endpoint_auth_url: String,

    #[serde(default)]
    pub endpoint_token_url: String,

    /// User info endpoint. An `{access_token}` placeholder is substituted when present.
    #[serde(default)]
    pub endpoint_userinfo_url: String,
}

impl IdentityProvider {
    pub fn is_social(&self) -> bool {
        self.kind == ProviderKind::Social
    }
}

/// Settings for one-time link tokens issued on behalf of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeTokenSettings {
    pub ttl_seconds: u64,
}

impl Default for OneTimeTokenSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_LINK_TOKEN_TTL_SECONDS,
        }
    }
}

/// Client application registered with the authorization server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Matches the authorization server's client id
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub identity_providers: Vec<IdentityProvider>,

    #[serde(default)]
    pub one_time_token_settings: OneTimeTokenSettings,
}

impl Application {
    /// Find a provider by kind and name
    pub fn find_provider(&self, kind: ProviderKind, name: &str) -> Option<&IdentityProvider> {
        self.identity_providers
            .iter()
            .find(|provider| provider.kind == kind && provider.name == name)
    }

    pub fn social_provider(&self, name: &str) -> Option<&IdentityProvider> {
        self.find_provider(ProviderKind::Social, name)
    }

    pub fn default_password_provider(&self) -> Option<&IdentityProvider> {
        self.find_provider(ProviderKind::Password, DEFAULT_PASSWORD_PROVIDER)
    }

    pub fn social_providers(&self) -> impl Iterator<Item = &IdentityProvider> {
        self.identity_providers.iter().filter(|p| p.is_social())
    }
}

/// Provider-agnostic profile returned by an external provider exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProfile {
    /// External id, never empty for a successful exchange
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    pub picture: Option<String>,

    /// Raw credential material (provider access token)
    pub token: String,
}

impl NormalizedProfile {
    /// Email if present and non-empty
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.is_empty())
    }

    /// Strip credential material before the profile leaves the service
    pub fn hide_sensitive(mut self) -> Self {
        self.token.clear();
        self
    }
}

/// Persisted binding between a local user and an external identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub id: Uuid,
    pub user_id: String,
    pub application_id: String,
    pub identity_provider_id: String,
    pub external_id: String,
    pub email: Option<String>,
    pub name: String,
    pub credential: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl LocalIdentity {
    /// Build a new identity for `user_id` from a fetched profile
    pub fn from_profile(
        user_id: &str,
        application_id: &str,
        provider: &IdentityProvider,
        profile: &NormalizedProfile,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            application_id: application_id.to_string(),
            identity_provider_id: provider.id.clone(),
            external_id: profile.id.clone(),
            email: profile.email().map(str::to_string),
            name: profile.name.clone(),
            credential: profile.token.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stored status of a launcher session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LauncherStatus {
    InProgress,
    Success,
    Canceled,
}

/// Status reported to launchers; `Expired` is the absence of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    InProgress,
    Success,
    Canceled,
    Expired,
}

impl HandoffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffStatus::InProgress => "in_progress",
            HandoffStatus::Success => "success",
            HandoffStatus::Canceled => "canceled",
            HandoffStatus::Expired => "expired",
        }
    }
}

impl From<LauncherStatus> for HandoffStatus {
    fn from(status: LauncherStatus) -> Self {
        match status {
            LauncherStatus::InProgress => HandoffStatus::InProgress,
            LauncherStatus::Success => HandoffStatus::Success,
            LauncherStatus::Canceled => HandoffStatus::Canceled,
        }
    }
}

/// Status payload returned by check/confirm/cancel and pushed to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: HandoffStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

impl StatusReport {
    pub fn new(status: HandoffStatus) -> Self {
        Self { status, url: None }
    }

    pub fn with_url(status: HandoffStatus, url: impl Into<String>) -> Self {
        Self {
            status,
            url: Some(url.into()),
        }
    }
}

/// Push notification payload
pub type StatusNotification = StatusReport;

/// Result of a session transition that decides between success and cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
    Canceled,
}

/// Handoff state kept per login challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherSession {
    pub challenge: String,
    pub provider: String,
    pub status: LauncherStatus,
    pub domain: String,
    pub resolved_identity: Option<LocalIdentity>,
    pub resolved_profile: Option<NormalizedProfile>,
    pub completion_url: Option<String>,
}

impl LauncherSession {
    pub fn new(challenge: &str, provider: &str, domain: &str) -> Self {
        Self {
            challenge: challenge.to_string(),
            provider: provider.to_string(),
            status: LauncherStatus::InProgress,
            domain: domain.to_string(),
            resolved_identity: None,
            resolved_profile: None,
            completion_url: None,
        }
    }

    /// Store the outcome of the provider callback. Status stays `InProgress`.
    pub fn attach_resolution(
        &mut self,
        domain: &str,
        identity: Option<LocalIdentity>,
        profile: NormalizedProfile,
    ) -> Result<()> {
        if self.status != LauncherStatus::InProgress {
            return Err(HandoffError::InvalidState(format!(
                "cannot attach resolution to a {:?} session",
                self.status
            )));
        }

        self.domain = domain.to_string();
        self.resolved_identity = identity;
        self.resolved_profile = Some(profile);
        Ok(())
    }

    /// Whether both sessions carry the same callback outcome
    pub fn same_resolution(&self, other: &LauncherSession) -> bool {
        self.provider == other.provider
            && self.domain == other.domain
            && self.resolved_identity == other.resolved_identity
            && self.resolved_profile == other.resolved_profile
    }

    /// Move to `Success` with the given completion URL
    pub fn confirm(&mut self, url: &str) -> ConfirmOutcome {
        match self.status {
            LauncherStatus::Canceled => ConfirmOutcome::Canceled,
            LauncherStatus::Success => ConfirmOutcome::AlreadyConfirmed,
            LauncherStatus::InProgress => {
                self.status = LauncherStatus::Success;
                self.completion_url = Some(url.to_string());
                ConfirmOutcome::Confirmed
            }
        }
    }

    /// Move to `Canceled` from any state
    pub fn cancel(&mut self) {
        self.status = LauncherStatus::Canceled;
        self.completion_url = None;
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: self.status.into(),
            url: self.completion_url.clone(),
        }
    }
}

/// Payload of a one-time link token carrying a fetched profile to signup/link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinkPayload {
    /// Id of a matching local identity, when one was found by email
    pub local_identity_ref: Option<String>,
    pub profile: NormalizedProfile,
    pub provider: String,
}

/// Closed set of payloads carried by one-time tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPayload {
    SocialLink(SocialLinkPayload),
}

impl TokenPayload {
    pub fn into_social_link(self) -> Option<SocialLinkPayload> {
        match self {
            TokenPayload::SocialLink(payload) => Some(payload),
        }
    }
}

/// OAuth2 `state` parameter sent to the provider on forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardState {
    pub challenge: String,
    #[serde(default)]
    pub launcher: bool,
}

impl ForwardState {
    /// base64(JSON)
    pub fn encode(&self) -> Result<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| HandoffError::Serialization(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(state: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(state)
            .map_err(|e| HandoffError::InvalidForwardState(format!("unable to decode: {}", e)))?;
        let state: ForwardState = serde_json::from_slice(&bytes)
            .map_err(|e| HandoffError::InvalidForwardState(format!("unable to unmarshal: {}", e)))?;

        if state.challenge.is_empty() {
            return Err(HandoffError::InvalidForwardState(
                "missing login challenge".to_string(),
            ));
        }

        Ok(state)
    }
}

/// Result of resolving a provider callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: Option<LocalIdentity>,
    pub profile: NormalizedProfile,
}

/// Public description of a configured social provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
}

/// Pending login request as reported by the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub challenge: String,
    pub client_id: String,
}

/// Body of an accept-login call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAcceptance {
    pub subject: String,
    pub remember: bool,
    pub remember_for: u64,
}

/// Request metadata recorded in the auth log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthAction {
    Auth,
}

/// Audit record of a successful social login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLogEntry {
    pub id: Uuid,
    pub action: AuthAction,
    pub user_id: String,
    pub identity_id: Uuid,
    pub application_id: String,
    pub provider_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: u64,
}

impl AuthLogEntry {
    pub fn new(
        action: AuthAction,
        identity: &LocalIdentity,
        application: &Application,
        provider: &IdentityProvider,
        context: &ClientContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            user_id: identity.user_id.clone(),
            identity_id: identity.id,
            application_id: application.id.clone(),
            provider_id: provider.id.clone(),
            ip: context.ip.clone(),
            user_agent: context.user_agent.clone(),
            created_at: current_timestamp(),
        }
    }
}
