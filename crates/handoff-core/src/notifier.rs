//! Realtime notifier implementations.

use crate::errors::{HandoffError, Result};
use crate::traits::Notifier;
use crate::types::{HandoffStatus, StatusNotification};
use crate::utils::hash_for_log;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 16;

/// In-process per-challenge broadcast channels
///
/// Subscribers receive every notification published after they subscribed.
/// Publishing to a challenge without subscribers succeeds and is dropped.
/// Any terminal notification closes the channel once delivered.
#[derive(Default)]
pub struct BroadcastNotifier {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<StatusNotification>>>>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to notifications for `challenge`
    pub async fn subscribe(&self, challenge: &str) -> broadcast::Receiver<StatusNotification> {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);

        channels
            .entry(challenge.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of challenges with an open channel
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, challenge: &str, notification: &StatusNotification) -> Result<()> {
        let mut channels = self.channels.write().await;

        let Some(sender) = channels.get(challenge) else {
            return Ok(());
        };

        let delivered = sender.send(notification.clone()).unwrap_or(0);
        debug!(
            challenge_hash = %hash_for_log(challenge),
            status = notification.status.as_str(),
            delivered = delivered,
            "Status broadcast"
        );

        if delivered == 0 || notification.status != HandoffStatus::InProgress {
            channels.remove(challenge);
        }

        Ok(())
    }
}

/// Publishes to every inner notifier, reporting the first failure
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn publish(&self, challenge: &str, notification: &StatusNotification) -> Result<()> {
        let mut first_error: Option<HandoffError> = None;

        for notifier in &self.notifiers {
            if let Err(e) = notifier.publish(challenge, notification).await {
                warn!(
                    challenge_hash = %hash_for_log(challenge),
                    error = %e,
                    "Notifier failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusReport;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn publish(&self, _challenge: &str, _notification: &StatusNotification) -> Result<()> {
            Err(HandoffError::Notification("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new();
        notifier
            .publish("c1", &StatusReport::new(HandoffStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(notifier.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_notifications() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe("c1").await;
        let mut other = notifier.subscribe("c2").await;

        notifier
            .publish("c1", &StatusReport::new(HandoffStatus::InProgress))
            .await
            .unwrap();
        notifier
            .publish("c1", &StatusReport::with_url(HandoffStatus::Success, "https://x/done"))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().status, HandoffStatus::InProgress);
        let success = rx.recv().await.unwrap();
        assert_eq!(success.url.as_deref(), Some("https://x/done"));

        // success closes the channel
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
        assert!(matches!(other.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_canceled_closes_the_channel() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe("c1").await;

        notifier
            .publish("c1", &StatusReport::new(HandoffStatus::Canceled))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().status, HandoffStatus::Canceled);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
        assert_eq!(notifier.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_fanout_reports_failure_but_delivers() {
        let broadcast = Arc::new(BroadcastNotifier::new());
        let mut rx = broadcast.subscribe("c1").await;

        let fanout = FanoutNotifier::new(vec![
            Arc::new(FailingNotifier) as Arc<dyn Notifier>,
            broadcast.clone() as Arc<dyn Notifier>,
        ]);

        let result = fanout
            .publish("c1", &StatusReport::new(HandoffStatus::InProgress))
            .await;

        assert!(matches!(result, Err(HandoffError::Notification(_))));
        assert_eq!(rx.recv().await.unwrap().status, HandoffStatus::InProgress);
    }
}
