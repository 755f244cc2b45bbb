//! Session-Creation Function
//!
//! The client's view of `POST /api/checkout`.

use async_trait::async_trait;
use serde::Deserialize;
use tokentier_core::CheckoutPayload;

use crate::error::{CheckoutError, Result};

/// A signed-in user as seen by the client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    /// Bearer token forwarded to the session-creation function
    pub access_token: String,
    pub user_id: String,
}

#[async_trait]
pub trait SessionFunction: Send + Sync {
    /// Request a hosted checkout session. `Ok(None)` means the call
    /// succeeded but no redirect URL came back.
    async fn create_session(
        &self,
        access_token: &str,
        payload: &CheckoutPayload,
    ) -> Result<Option<String>>;
}

/// Either half of the endpoint's reply: `{url}` or `{error, code}`
#[derive(Debug, Default, Deserialize)]
struct SessionReply {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Calls the session-creation endpoint over HTTP
pub struct HttpSessionFunction {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionFunction {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionFunction for HttpSessionFunction {
    async fn create_session(
        &self,
        access_token: &str,
        payload: &CheckoutPayload,
    ) -> Result<Option<String>> {
        let response = self
            .http
            .post(format!("{}/api/checkout", self.base_url))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let reply = serde_json::from_str::<SessionReply>(&body);

        if !status.is_success() {
            let reply = reply.unwrap_or_else(|e| {
                tracing::debug!(status = %status, error = %e, "Unreadable error body");
                SessionReply::default()
            });
            tracing::debug!(status = %status, "Session creation rejected");
            return Err(CheckoutError::Provider(
                reply
                    .error
                    .unwrap_or_else(|| format!("Checkout failed ({status})")),
            ));
        }

        let reply = reply.map_err(|e| {
            tracing::warn!(status = %status, error = %e, "Unreadable session reply");
            CheckoutError::Network(format!("invalid session reply: {e}"))
        })?;

        Ok(reply.url.filter(|url| !url.is_empty()))
    }
}
