//! Launcher session store.
//!
//! Sessions are keyed by login challenge and live for [`LAUNCHER_SESSION_TTL`]
//! after their last write. Every transition is a single compare-and-swap against
//! the value it was computed from, so a concurrent write is never lost: the loser
//! re-reads and re-applies its transition.

use crate::errors::{HandoffError, Result};
use crate::tokens::TokenStore;
use crate::types::LauncherSession;
use crate::utils::hash_for_log;
use handoff_storage::{CasOutcome, Storage, CF_LAUNCHER_SESSIONS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Idle lifetime of a launcher session
pub const LAUNCHER_SESSION_TTL: Duration = Duration::from_secs(600);

const MAX_TRANSITION_ATTEMPTS: usize = 8;

pub struct LauncherSessionStore<S: Storage> {
    tokens: TokenStore<S>,
}

impl<S: Storage> LauncherSessionStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            tokens: TokenStore::new(storage, CF_LAUNCHER_SESSIONS),
        }
    }

    /// Create an `InProgress` session for `challenge`
    ///
    /// # Errors
    /// * `SessionExists` - A live session already exists for the challenge
    pub async fn open(
        &self,
        challenge: &str,
        provider: &str,
        domain: &str,
    ) -> Result<LauncherSession> {
        let session = LauncherSession::new(challenge, provider, domain);

        if !self
            .tokens
            .insert(challenge, &session, LAUNCHER_SESSION_TTL)
            .await?
        {
            warn!(
                challenge_hash = %hash_for_log(challenge),
                "Launcher session already exists"
            );
            return Err(HandoffError::SessionExists);
        }

        info!(
            challenge_hash = %hash_for_log(challenge),
            provider = provider,
            "Launcher session opened"
        );

        Ok(session)
    }

    /// Live session for `challenge`, if any
    pub async fn get(&self, challenge: &str) -> Result<Option<LauncherSession>> {
        self.tokens.find(challenge).await
    }

    /// Apply `apply` to the live session and write the result atomically
    ///
    /// `apply` may run more than once if another writer gets in between; it must
    /// only mutate the session it is given.
    ///
    /// # Errors
    /// * `NotFound` - No live session (never resurrects an expired one)
    /// * `Conflict` - Lost the race too many times in a row
    /// * Any error returned by `apply`
    pub async fn transition<T, F>(&self, challenge: &str, mut apply: F) -> Result<(LauncherSession, T)>
    where
        F: FnMut(&mut LauncherSession) -> Result<T> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current: LauncherSession = self.tokens.get_by_key(challenge).await?;
            let mut next = current.clone();
            let output = apply(&mut next)?;

            match self
                .tokens
                .replace(challenge, &current, &next, LAUNCHER_SESSION_TTL)
                .await?
            {
                CasOutcome::Swapped => {
                    debug!(
                        challenge_hash = %hash_for_log(challenge),
                        status = ?next.status,
                        "Launcher session updated"
                    );
                    return Ok((next, output));
                }
                CasOutcome::Missing => {
                    return Err(HandoffError::NotFound(format!(
                        "launcher session {}",
                        hash_for_log(challenge)
                    )));
                }
                CasOutcome::Conflict => {
                    debug!(
                        challenge_hash = %hash_for_log(challenge),
                        attempt = attempt,
                        "Launcher session changed concurrently, retrying"
                    );
                }
            }
        }

        Err(HandoffError::Conflict(format!(
            "launcher session {} kept changing",
            hash_for_log(challenge)
        )))
    }
}
