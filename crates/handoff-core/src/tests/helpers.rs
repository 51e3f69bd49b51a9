//! Test helpers and fakes for handoff tests.

use crate::*;
use async_trait::async_trait;
use handoff_storage::RocksDbStorage;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const APP_ID: &str = "app-1";
pub const GOOGLE: &str = "google";
pub const GOOGLE_PROVIDER_ID: &str = "provider-google";
pub const PASSWORD_PROVIDER_ID: &str = "provider-initial";
pub const DOMAIN: &str = "https://x";

/// Authorization server fake: every challenge belongs to `APP_ID` except "unknown"
#[derive(Default)]
pub struct FakeAuthorizationServer {
    pub accepted: Mutex<Vec<(String, LoginAcceptance)>>,
    before_login_request: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send>>>>,
}

impl FakeAuthorizationServer {
    /// Run `hook` to completion inside the next login request lookup
    pub fn on_next_login_request(&self, hook: impl Future<Output = ()> + Send + 'static) {
        *self.before_login_request.lock().unwrap() = Some(Box::pin(hook));
    }
}

#[async_trait]
impl AuthorizationServer for FakeAuthorizationServer {
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest> {
        let hook = self.before_login_request.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        if challenge == "unknown" {
            return Err(HandoffError::AuthorizationServer(
                "login request not found".to_string(),
            ));
        }
        Ok(LoginRequest {
            challenge: challenge.to_string(),
            client_id: APP_ID.to_string(),
        })
    }

    async fn accept_login_request(
        &self,
        challenge: &str,
        acceptance: &LoginAcceptance,
    ) -> Result<String> {
        self.accepted
            .lock()
            .unwrap()
            .push((challenge.to_string(), acceptance.clone()));
        Ok(format!("https://auth.test/oauth2/auth?login_verifier=v-{}", challenge))
    }
}

/// Provider fake mapping authorization codes to profiles
#[derive(Default)]
pub struct FakeProviderClient {
    profiles: Mutex<HashMap<String, NormalizedProfile>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeProviderClient {
    pub fn add_profile(&self, code: &str, profile: NormalizedProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(code.to_string(), profile);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    fn authorization_url(
        &self,
        provider: &IdentityProvider,
        _domain: &str,
        state: &str,
    ) -> Result<String> {
        Ok(format!("{}?state={}", provider.endpoint_auth_url, state))
    }

    async fn exchange(
        &self,
        _provider: &IdentityProvider,
        _domain: &str,
        code: &str,
    ) -> Result<NormalizedProfile> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.profiles
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| HandoffError::ProfileFetchFailed(format!("unknown code {}", code)))
    }
}

/// Notifier that records everything it publishes
#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<(String, StatusNotification)>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn statuses(&self) -> Vec<HandoffStatus> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.status)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, challenge: &str, notification: &StatusNotification) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(HandoffError::Notification("push service down".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((challenge.to_string(), notification.clone()));
        Ok(())
    }
}

/// Auth log that always fails
pub struct FailingAuthLog;

#[async_trait]
impl AuthLog for FailingAuthLog {
    async fn add(&self, _entry: &AuthLogEntry) -> Result<()> {
        Err(HandoffError::AuditLog("sink unavailable".to_string()))
    }
}

pub fn create_test_storage() -> (Arc<RocksDbStorage>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = RocksDbStorage::open(temp_dir.path()).unwrap();
    (Arc::new(db), temp_dir)
}

pub fn provider(id: &str, name: &str, kind: ProviderKind) -> IdentityProvider {
    IdentityProvider {
        id: id.to_string(),
        name: name.to_string(),
        display_name: name.to_uppercase(),
        kind,
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        client_scopes: vec!["email".to_string()],
        endpoint_auth_url: format!("https://{}.test/auth", name),
        endpoint_token_url: format!("https://{}.test/token", name),
        endpoint_userinfo_url: format!("https://{}.test/userinfo", name),
    }
}

pub fn test_application() -> Application {
    Application {
        id: APP_ID.to_string(),
        name: "Test App".to_string(),
        description: String::new(),
        identity_providers: vec![
            provider(PASSWORD_PROVIDER_ID, DEFAULT_PASSWORD_PROVIDER, ProviderKind::Password),
            provider(GOOGLE_PROVIDER_ID, GOOGLE, ProviderKind::Social),
            provider("provider-twitch", "twitch", ProviderKind::Social),
        ],
        one_time_token_settings: OneTimeTokenSettings::default(),
    }
}

pub fn profile(id: &str, email: Option<&str>) -> NormalizedProfile {
    NormalizedProfile {
        id: id.to_string(),
        email: email.map(str::to_string),
        name: "Alice".to_string(),
        picture: None,
        token: "provider-access-token".to_string(),
    }
}

pub struct TestHarness {
    pub storage: Arc<RocksDbStorage>,
    pub controller: HandoffController<RocksDbStorage>,
    pub identities: Arc<StorageIdentityStore<RocksDbStorage>>,
    pub auth_log: Arc<StorageAuthLog<RocksDbStorage>>,
    pub authorization_server: Arc<FakeAuthorizationServer>,
    pub provider_client: Arc<FakeProviderClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub application: Application,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn resolver(&self) -> &SocialIdentityResolver<RocksDbStorage> {
        self.controller.resolver()
    }

    pub fn sessions(&self) -> LauncherSessionStore<RocksDbStorage> {
        LauncherSessionStore::new(Arc::clone(&self.storage))
    }

    pub fn google(&self) -> &IdentityProvider {
        self.application.social_provider(GOOGLE).unwrap()
    }

    /// Bind `profile` to `user_id` at google
    pub async fn add_google_identity(&self, user_id: &str, profile: &NormalizedProfile) -> LocalIdentity {
        let identity = LocalIdentity::from_profile(user_id, APP_ID, self.google(), profile);
        self.identities.create(&identity).await.unwrap();
        identity
    }

    /// Bind an email/password account to `user_id`
    pub async fn add_password_identity(&self, user_id: &str, email: &str) -> LocalIdentity {
        let password = self.application.default_password_provider().unwrap();
        let identity = LocalIdentity::from_profile(user_id, APP_ID, password, &profile(email, Some(email)));
        self.identities.create(&identity).await.unwrap();
        identity
    }
}

pub async fn create_harness() -> TestHarness {
    create_harness_with(ResolverSettings::default(), None).await
}

pub async fn create_harness_with(
    settings: ResolverSettings,
    auth_log_override: Option<Arc<dyn AuthLog>>,
) -> TestHarness {
    let (storage, temp_dir) = create_test_storage();

    let applications = Arc::new(StorageApplicationDirectory::new(Arc::clone(&storage)));
    let application = test_application();
    applications.save(&application).await.unwrap();

    let identities = Arc::new(StorageIdentityStore::new(Arc::clone(&storage)));
    let auth_log = Arc::new(StorageAuthLog::new(Arc::clone(&storage)));
    let authorization_server = Arc::new(FakeAuthorizationServer::default());
    let provider_client = Arc::new(FakeProviderClient::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let collaborators = Collaborators {
        authorization_server: authorization_server.clone(),
        applications,
        identities: identities.clone(),
        auth_log: auth_log_override.unwrap_or_else(|| auth_log.clone() as Arc<dyn AuthLog>),
        provider_client: provider_client.clone(),
    };

    let resolver = SocialIdentityResolver::new(Arc::clone(&storage), collaborators, settings);
    let controller = HandoffController::new(
        LauncherSessionStore::new(Arc::clone(&storage)),
        resolver,
        notifier.clone(),
    );

    TestHarness {
        storage,
        controller,
        identities,
        auth_log,
        authorization_server,
        provider_client,
        notifier,
        application,
        _temp_dir: temp_dir,
    }
}

/// Encoded `state` the provider echoes back on callback
pub fn forward_state(challenge: &str, launcher: bool) -> String {
    ForwardState {
        challenge: challenge.to_string(),
        launcher,
    }
    .encode()
    .unwrap()
}

/// Value of a query parameter in `url`
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
