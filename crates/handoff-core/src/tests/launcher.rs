//! Launcher session store tests.

use super::helpers::*;
use crate::*;
use handoff_storage::CF_LAUNCHER_SESSIONS;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_open_creates_in_progress_session() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = LauncherSessionStore::new(storage);

    let opened = sessions.open("c1", GOOGLE, DOMAIN).await.unwrap();
    assert_eq!(opened.status, LauncherStatus::InProgress);

    let stored = sessions.get("c1").await.unwrap().unwrap();
    assert_eq!(stored, opened);
    assert_eq!(stored.completion_url, None);
}

#[tokio::test]
async fn test_open_twice_fails_with_session_exists() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = LauncherSessionStore::new(storage);

    sessions.open("c1", GOOGLE, DOMAIN).await.unwrap();
    let second = sessions.open("c1", "twitch", DOMAIN).await;

    assert!(matches!(second, Err(HandoffError::SessionExists)));
    assert_eq!(sessions.get("c1").await.unwrap().unwrap().provider, GOOGLE);
}

#[tokio::test]
async fn test_transition_on_missing_session_is_not_found() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = LauncherSessionStore::new(storage);

    let result = sessions
        .transition("c1", |session| {
            session.cancel();
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(HandoffError::NotFound(_))));
    assert!(sessions.get("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_transition_does_not_resurrect_expired_session() {
    let (storage, _temp_dir) = create_test_storage();
    let tokens = TokenStore::new(Arc::clone(&storage), CF_LAUNCHER_SESSIONS);
    tokens
        .set(
            "c1",
            &LauncherSession::new("c1", GOOGLE, DOMAIN),
            Duration::from_millis(30),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let sessions = LauncherSessionStore::new(storage);
    let result = sessions
        .transition("c1", |session| Ok(session.confirm("https://x/done")))
        .await;

    assert!(matches!(result, Err(HandoffError::NotFound(_))));
    assert!(sessions.get("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_transition_error_leaves_session_untouched() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = LauncherSessionStore::new(storage);
    sessions.open("c1", GOOGLE, DOMAIN).await.unwrap();
    sessions
        .transition("c1", |session| {
            session.cancel();
            Ok(())
        })
        .await
        .unwrap();

    let result = sessions
        .transition("c1", |session| {
            session.attach_resolution(DOMAIN, None, profile("g123", None))
        })
        .await;

    assert!(matches!(result, Err(HandoffError::InvalidState(_))));
    let stored = sessions.get("c1").await.unwrap().unwrap();
    assert_eq!(stored.status, LauncherStatus::Canceled);
    assert_eq!(stored.resolved_profile, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transitions_do_not_lose_updates() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = Arc::new(LauncherSessionStore::new(storage));
    sessions.open("c1", GOOGLE, "d").await.unwrap();

    let writers = 6;
    let mut handles = Vec::new();
    for _ in 0..writers {
        let sessions = Arc::clone(&sessions);
        handles.push(tokio::spawn(async move {
            sessions
                .transition("c1", |session| {
                    session.domain.push('x');
                    Ok(())
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = sessions.get("c1").await.unwrap().unwrap();
    assert_eq!(stored.domain.len(), 1 + writers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirm_racing_cancel_ends_in_one_consistent_state() {
    let (storage, _temp_dir) = create_test_storage();
    let sessions = Arc::new(LauncherSessionStore::new(storage));
    sessions.open("c1", GOOGLE, DOMAIN).await.unwrap();

    let confirm = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            sessions
                .transition("c1", |session| Ok(session.confirm("https://x/done")))
                .await
        })
    };
    let cancel = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            sessions
                .transition("c1", |session| {
                    session.cancel();
                    Ok(())
                })
                .await
        })
    };

    let (_, outcome) = confirm.await.unwrap().unwrap();
    cancel.await.unwrap().unwrap();

    let stored = sessions.get("c1").await.unwrap().unwrap();
    // cancel always lands; confirm either ran first or observed the cancel
    assert_eq!(stored.status, LauncherStatus::Canceled);
    assert_eq!(stored.completion_url, None);
    assert!(matches!(
        outcome,
        ConfirmOutcome::Confirmed | ConfirmOutcome::Canceled
    ));
}
