//! Hydra-style authorization server admin client.

use async_trait::async_trait;
use handoff_core::{AuthorizationServer, HandoffError, LoginAcceptance, LoginRequest, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const LOGIN_REQUEST_PATH: &str = "oauth2/auth/requests/login";
const ACCEPT_LOGIN_PATH: &str = "oauth2/auth/requests/login/accept";

#[derive(Debug, Deserialize)]
struct LoginRequestBody {
    challenge: String,
    client: ClientBody,
}

#[derive(Debug, Deserialize)]
struct ClientBody {
    client_id: String,
}

#[derive(Debug, Serialize)]
struct AcceptLoginBody<'a> {
    subject: &'a str,
    remember: bool,
    remember_for: u64,
}

#[derive(Debug, Deserialize)]
struct CompletedRequest {
    redirect_to: String,
}

pub struct HydraAdminClient {
    http_client: Client,
    admin_url: Url,
}

impl HydraAdminClient {
    pub fn new(admin_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut admin_url = Url::parse(admin_url)?;
        if !admin_url.path().ends_with('/') {
            let path = format!("{}/", admin_url.path());
            admin_url.set_path(&path);
        }

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            admin_url,
        })
    }

    fn endpoint(&self, path: &str, challenge: &str) -> Result<Url> {
        let mut url = self
            .admin_url
            .join(path)
            .map_err(|e| HandoffError::AuthorizationServer(format!("invalid admin URL: {}", e)))?;
        url.query_pairs_mut().append_pair("login_challenge", challenge);
        Ok(url)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(HandoffError::AuthorizationServer(format!(
            "{} failed with status {}: {}",
            operation, status, body
        )));
    }

    response.json().await.map_err(|e| {
        HandoffError::AuthorizationServer(format!("{} returned invalid body: {}", operation, e))
    })
}

#[async_trait]
impl AuthorizationServer for HydraAdminClient {
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest> {
        let response = self
            .http_client
            .get(self.endpoint(LOGIN_REQUEST_PATH, challenge)?)
            .send()
            .await
            .map_err(|e| HandoffError::AuthorizationServer(e.to_string()))?;

        let body: LoginRequestBody = read_json(response, "Get login request").await?;

        Ok(LoginRequest {
            challenge: body.challenge,
            client_id: body.client.client_id,
        })
    }

    async fn accept_login_request(
        &self,
        challenge: &str,
        acceptance: &LoginAcceptance,
    ) -> Result<String> {
        let response = self
            .http_client
            .put(self.endpoint(ACCEPT_LOGIN_PATH, challenge)?)
            .json(&AcceptLoginBody {
                subject: &acceptance.subject,
                remember: acceptance.remember,
                remember_for: acceptance.remember_for,
            })
            .send()
            .await
            .map_err(|e| HandoffError::AuthorizationServer(e.to_string()))?;

        let body: CompletedRequest = read_json(response, "Accept login request").await?;
        Ok(body.redirect_to)
    }
}
