//! Social identity resolver tests.

use super::helpers::*;
use crate::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_forward_url_embeds_state() {
    let harness = create_harness().await;

    let url = harness
        .resolver()
        .forward_url("c1", GOOGLE, DOMAIN, true)
        .await
        .unwrap();

    assert!(url.starts_with("https://google.test/auth?state="));
    let state = ForwardState::decode(&query_param(&url, "state").unwrap()).unwrap();
    assert_eq!(state.challenge, "c1");
    assert!(state.launcher);
}

#[tokio::test]
async fn test_forward_url_unknown_provider() {
    let harness = create_harness().await;

    let result = harness
        .resolver()
        .forward_url("c1", "facebook", DOMAIN, false)
        .await;
    assert!(matches!(result, Err(HandoffError::ProviderNotFound(_))));

    // password providers are not social
    let result = harness
        .resolver()
        .forward_url("c1", DEFAULT_PASSWORD_PROVIDER, DOMAIN, false)
        .await;
    assert!(matches!(result, Err(HandoffError::ProviderNotFound(_))));
}

#[tokio::test]
async fn test_resolve_finds_existing_identity() {
    let harness = create_harness().await;
    let alice = profile("g123", Some("a@b.com"));
    let identity = harness.add_google_identity("user-1", &alice).await;
    harness.provider_client.add_profile("abc", alice.clone());

    let resolution = harness
        .resolver()
        .resolve("c1", GOOGLE, DOMAIN, "abc")
        .await
        .unwrap();

    assert_eq!(resolution.identity, Some(identity));
    assert_eq!(resolution.profile, alice);
}

#[tokio::test]
async fn test_resolve_without_identity_is_not_an_error() {
    let harness = create_harness().await;
    harness
        .provider_client
        .add_profile("abc", profile("g999", None));

    let resolution = harness
        .resolver()
        .resolve("c1", GOOGLE, DOMAIN, "abc")
        .await
        .unwrap();

    assert_eq!(resolution.identity, None);
    assert_eq!(resolution.profile.id, "g999");
}

#[tokio::test]
async fn test_resolve_rejects_empty_external_id() {
    let harness = create_harness().await;
    harness.provider_client.add_profile("abc", profile("", None));

    let result = harness.resolver().resolve("c1", GOOGLE, DOMAIN, "abc").await;
    assert!(matches!(result, Err(HandoffError::ProfileFetchFailed(_))));
}

#[tokio::test]
async fn test_resolve_exchange_timeout() {
    let settings = ResolverSettings {
        exchange_timeout: Duration::from_millis(20),
        ..ResolverSettings::default()
    };
    let harness = create_harness_with(settings, None).await;
    harness
        .provider_client
        .add_profile("abc", profile("g123", None));
    harness.provider_client.set_delay(Duration::from_millis(200));

    let result = harness.resolver().resolve("c1", GOOGLE, DOMAIN, "abc").await;
    assert!(matches!(result, Err(HandoffError::ProfileFetchFailed(_))));
}

#[tokio::test]
async fn test_resolve_propagates_authorization_server_failure() {
    let harness = create_harness().await;

    let result = harness
        .resolver()
        .resolve("unknown", GOOGLE, DOMAIN, "abc")
        .await;
    assert!(matches!(result, Err(HandoffError::AuthorizationServer(_))));
}

#[tokio::test]
async fn test_accept_logs_and_accepts_login() {
    let harness = create_harness().await;
    let identity = harness
        .add_google_identity("user-1", &profile("g123", None))
        .await;
    let context = ClientContext {
        ip: Some("10.0.0.1".to_string()),
        user_agent: Some("launcher/1.0".to_string()),
    };

    let url = harness
        .resolver()
        .accept(&identity, GOOGLE, "c1", &context)
        .await
        .unwrap();
    assert_eq!(url, "https://auth.test/oauth2/auth?login_verifier=v-c1");

    let accepted = harness.authorization_server.accepted.lock().unwrap().clone();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].0, "c1");
    assert_eq!(
        accepted[0].1,
        LoginAcceptance {
            subject: "user-1".to_string(),
            remember: true,
            remember_for: 259_200,
        }
    );
}

#[tokio::test]
async fn test_accept_fails_when_auth_log_fails() {
    let harness = create_harness_with(
        ResolverSettings::default(),
        Some(Arc::new(FailingAuthLog) as Arc<dyn AuthLog>),
    )
    .await;
    let identity = harness
        .add_google_identity("user-1", &profile("g123", None))
        .await;

    let result = harness
        .resolver()
        .accept(&identity, GOOGLE, "c1", &ClientContext::default())
        .await;

    assert!(matches!(result, Err(HandoffError::AuditLog(_))));
    assert!(harness.authorization_server.accepted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_accept_continues_when_audit_failure_is_not_fatal() {
    let settings = ResolverSettings {
        audit_failure_is_fatal: false,
        ..ResolverSettings::default()
    };
    let harness =
        create_harness_with(settings, Some(Arc::new(FailingAuthLog) as Arc<dyn AuthLog>)).await;
    let identity = harness
        .add_google_identity("user-1", &profile("g123", None))
        .await;

    let url = harness
        .resolver()
        .accept(&identity, GOOGLE, "c1", &ClientContext::default())
        .await
        .unwrap();
    assert!(url.contains("login_verifier"));
}

#[tokio::test]
async fn test_social_login_handoff_offers_link_for_matching_email() {
    let harness = create_harness().await;
    let existing = harness.add_password_identity("user-1", "a@b.com").await;
    let alice = profile("g123", Some("a@b.com"));

    let url = harness
        .resolver()
        .social_login_handoff(&alice, DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();

    assert!(url.starts_with("https://x/social-existing/google?login_challenge=c1&token="));
    let token = query_param(&url, "token").unwrap();
    let payload = harness.resolver().link_payload(&token).await.unwrap();
    assert_eq!(payload.local_identity_ref, Some(existing.id.to_string()));
    assert_eq!(payload.profile, alice);
    assert_eq!(payload.provider, GOOGLE);
}

#[tokio::test]
async fn test_social_login_handoff_offers_signup_for_unknown_email() {
    let harness = create_harness().await;
    let bob = profile("g456", Some("bob@b.com"));

    let url = harness
        .resolver()
        .social_login_handoff(&bob, DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();

    assert!(url.starts_with("https://x/social-new/google?login_challenge=c1&token="));
    let token = query_param(&url, "token").unwrap();
    let payload = harness.resolver().link_payload(&token).await.unwrap();
    assert_eq!(payload.local_identity_ref, None);
}

#[tokio::test]
async fn test_social_login_handoff_requires_default_password_provider_for_email() {
    let harness = create_harness().await;
    let mut application = test_application();
    application
        .identity_providers
        .retain(|p| p.kind != ProviderKind::Password);
    StorageApplicationDirectory::new(harness.storage.clone())
        .save(&application)
        .await
        .unwrap();

    let result = harness
        .resolver()
        .social_login_handoff(&profile("g1", Some("a@b.com")), DOMAIN, GOOGLE, "c1")
        .await;
    assert!(matches!(result, Err(HandoffError::ProviderNotFound(_))));

    // without an email the password provider is not consulted
    let url = harness
        .resolver()
        .social_login_handoff(&profile("g1", None), DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();
    assert!(url.contains("/social-new/"));
}

#[tokio::test]
async fn test_link_creates_identity_and_consumes_token() {
    let harness = create_harness().await;
    let alice = profile("g123", Some("a@b.com"));
    let url = harness
        .resolver()
        .social_login_handoff(&alice, DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();
    let token = query_param(&url, "token").unwrap();

    let identity = harness
        .resolver()
        .link(&token, "user-7", &harness.application)
        .await
        .unwrap();

    assert_eq!(identity.user_id, "user-7");
    assert_eq!(identity.external_id, "g123");
    assert_eq!(identity.identity_provider_id, GOOGLE_PROVIDER_ID);
    assert_eq!(identity.credential, "provider-access-token");

    let found = harness
        .identities
        .find_by_provider_and_external_id(GOOGLE_PROVIDER_ID, "g123")
        .await
        .unwrap();
    assert_eq!(found, Some(identity));

    let reuse = harness
        .resolver()
        .link(&token, "user-8", &harness.application)
        .await;
    assert!(matches!(reuse, Err(HandoffError::NotFound(_))));
    assert!(!harness.resolver().check_token(&token).await);
}

#[tokio::test]
async fn test_link_twice_for_same_user_is_already_linked() {
    let harness = create_harness().await;
    let first_url = harness
        .resolver()
        .social_login_handoff(&profile("g1", None), DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();
    let second_url = harness
        .resolver()
        .social_login_handoff(&profile("g2", None), DOMAIN, GOOGLE, "c2")
        .await
        .unwrap();

    harness
        .resolver()
        .link(&query_param(&first_url, "token").unwrap(), "user-1", &harness.application)
        .await
        .unwrap();
    let second = harness
        .resolver()
        .link(&query_param(&second_url, "token").unwrap(), "user-1", &harness.application)
        .await;

    assert!(matches!(second, Err(HandoffError::AlreadyLinked)));
    let absent = harness
        .identities
        .find_by_provider_and_external_id(GOOGLE_PROVIDER_ID, "g2")
        .await
        .unwrap();
    assert_eq!(absent, None);
}

#[tokio::test]
async fn test_providers_lists_social_providers_only() {
    let harness = create_harness().await;

    let providers = harness.resolver().providers("c1").await.unwrap();
    let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();

    assert_eq!(names, vec![GOOGLE, "twitch"]);
    assert_eq!(providers[0].display_name, "GOOGLE");
}

#[tokio::test]
async fn test_profile_hides_credential_and_keeps_token() {
    let harness = create_harness().await;
    let url = harness
        .resolver()
        .social_login_handoff(&profile("g1", Some("a@b.com")), DOMAIN, GOOGLE, "c1")
        .await
        .unwrap();
    let token = query_param(&url, "token").unwrap();

    let first = harness.resolver().profile(&token).await.unwrap();
    let second = harness.resolver().profile(&token).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id, "g1");
    assert!(first.token.is_empty());
    assert!(harness.resolver().check_token(&token).await);
}

#[tokio::test]
async fn test_profile_of_unknown_token_is_not_found() {
    let harness = create_harness().await;

    let result = harness.resolver().profile("deadbeef").await;
    assert!(matches!(result, Err(HandoffError::NotFound(_))));
    assert!(!harness.resolver().check_token("deadbeef").await);
}
