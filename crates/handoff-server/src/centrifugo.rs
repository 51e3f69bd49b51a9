//! Centrifugo-compatible push publisher.

use crate::config::CentrifugoConfig;
use async_trait::async_trait;
use handoff_core::{hash_for_log, HandoffError, Notifier, Result, StatusNotification};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct PublishCommand<'a> {
    method: &'static str,
    params: PublishParams<'a>,
}

#[derive(Debug, Serialize)]
struct PublishParams<'a> {
    channel: String,
    data: &'a StatusNotification,
}

#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    error: Option<ApiReplyError>,
}

#[derive(Debug, Deserialize)]
struct ApiReplyError {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    message: String,
}

/// Publishes launcher status changes on `"{launcher_channel}:{challenge}"`
pub struct CentrifugoNotifier {
    http_client: Client,
    api_url: String,
    api_key: String,
    launcher_channel: String,
}

impl CentrifugoNotifier {
    pub fn new(config: &CentrifugoConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            api_url: format!("{}/api", config.addr.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            launcher_channel: config.launcher_channel.clone(),
        })
    }

    fn channel(&self, challenge: &str) -> String {
        format!("{}:{}", self.launcher_channel, challenge)
    }
}

#[async_trait]
impl Notifier for CentrifugoNotifier {
    async fn publish(&self, challenge: &str, notification: &StatusNotification) -> Result<()> {
        let command = PublishCommand {
            method: "publish",
            params: PublishParams {
                channel: self.channel(challenge),
                data: notification,
            },
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("apikey {}", self.api_key),
            )
            .json(&command)
            .send()
            .await
            .map_err(|e| HandoffError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HandoffError::Notification(format!(
                "publish failed with status {}",
                response.status()
            )));
        }

        let reply: ApiReply = response.json().await.unwrap_or_default();
        if let Some(error) = reply.error {
            return Err(HandoffError::Notification(format!(
                "publish rejected ({}): {}",
                error.code, error.message
            )));
        }

        tracing::debug!(
            challenge_hash = %hash_for_log(challenge),
            status = notification.status.as_str(),
            "Status published"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use handoff_core::{HandoffStatus, StatusReport};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn api(
        State(received): State<Received>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("apikey secret") {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        let channel = body["params"]["channel"].as_str().unwrap_or_default().to_string();
        received.lock().unwrap().push(body);
        if channel.ends_with(":forbidden") {
            return (
                StatusCode::OK,
                Json(json!({ "error": { "code": 103, "message": "permission denied" } })),
            );
        }
        (StatusCode::OK, Json(json!({ "result": {} })))
    }

    async fn spawn_centrifugo() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/api", post(api))
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    fn notifier(addr: String, api_key: &str) -> CentrifugoNotifier {
        let config = CentrifugoConfig {
            addr,
            api_key: api_key.to_string(),
            launcher_channel: "launcher".to_string(),
        };
        CentrifugoNotifier::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_publish_sends_command_on_challenge_channel() {
        let (addr, received) = spawn_centrifugo().await;
        let notifier = notifier(addr, "secret");

        notifier
            .publish(
                "c1",
                &StatusReport::with_url(HandoffStatus::Success, "https://x/done"),
            )
            .await
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["method"], "publish");
        assert_eq!(received[0]["params"]["channel"], "launcher:c1");
        assert_eq!(received[0]["params"]["data"]["status"], "success");
        assert_eq!(received[0]["params"]["data"]["url"], "https://x/done");
    }

    #[tokio::test]
    async fn test_publish_failures_are_notification_errors() {
        let (addr, _received) = spawn_centrifugo().await;

        let unauthorized = notifier(addr.clone(), "wrong")
            .publish("c1", &StatusReport::new(HandoffStatus::InProgress))
            .await;
        assert!(matches!(unauthorized, Err(HandoffError::Notification(_))));

        let rejected = notifier(addr, "secret")
            .publish("forbidden", &StatusReport::new(HandoffStatus::InProgress))
            .await;
        assert!(matches!(rejected, Err(HandoffError::Notification(_))));
    }
}
