//! FCM HTTP v1 `messages:send`.
//!
//! The v1 API has no multicast call, so [`FcmClient::send_multicast`] fans
//! out one request per token and reports per-token failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::error::{PushError, PushResult};
use crate::token::AccessTokenProvider;

const FCM_BASE_URL: &str = "https://fcm.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MULTICAST_CONCURRENCY: usize = 8;

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Token(String),
    Topic(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    #[serde(flatten)]
    target: &'a Target,
    notification: &'a Notification,
    data: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: Option<String>,
}

/// Outcome of a single send. FCM rejections are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl SendResult {
    fn delivered(message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            status: None,
            error: None,
        }
    }

    fn rejected(status: u16, error: Value) -> Self {
        Self {
            success: false,
            message: None,
            status: Some(status),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenFailure {
    pub token: String,
    pub error: Option<Value>,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MulticastResult {
    pub success: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<TokenFailure>,
}

impl MulticastResult {
    fn collect(results: Vec<(String, PushResult<SendResult>)>) -> Self {
        let mut success_count = 0;
        let mut errors = Vec::new();
        for (token, result) in results {
            match result {
                Ok(sent) if sent.success => success_count += 1,
                Ok(sent) => errors.push(TokenFailure {
                    token,
                    error: sent.error,
                    status: sent.status,
                }),
                Err(e) => errors.push(TokenFailure {
                    token,
                    error: Some(Value::String(e.to_string())),
                    status: None,
                }),
            }
        }

        Self {
            success: true,
            success_count,
            failure_count: errors.len(),
            errors,
        }
    }
}

pub struct FcmClient {
    client: Client,
    endpoint: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FcmClient {
    pub fn new(project_id: &str, tokens: Arc<dyn AccessTokenProvider>) -> PushResult<Self> {
        Self::with_base_url(FCM_BASE_URL, project_id, tokens)
    }

    pub fn with_base_url(
        base_url: &str,
        project_id: &str,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> PushResult<Self> {
        if project_id.trim().is_empty() {
            return Err(PushError::MissingProjectId);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PushError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id.trim()
            ),
            tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self, notification, data))]
    pub async fn send(
        &self,
        target: &Target,
        notification: &Notification,
        data: &HashMap<String, String>,
    ) -> PushResult<SendResult> {
        let bearer = self.tokens.access_token().await?;
        let request = SendRequest {
            message: Message {
                target,
                notification,
                data,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&bearer.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PushError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            counter!("push_sends_total", "outcome" => "delivered").increment(1);
            let body: SendResponse = response
                .json()
                .await
                .map_err(|e| PushError::Http(format!("Invalid FCM response: {}", e)))?;
            return Ok(SendResult::delivered(body.name));
        }

        counter!("push_sends_total", "outcome" => "rejected").increment(1);
        let text = response.text().await.unwrap_or_default();
        let error = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": text }));
        warn!(status = status.as_u16(), "FCM rejected message");
        Ok(SendResult::rejected(status.as_u16(), error))
    }

    pub async fn send_to_token(
        &self,
        token: &str,
        notification: &Notification,
        data: &HashMap<String, String>,
    ) -> PushResult<SendResult> {
        self.send(&Target::Token(token.to_string()), notification, data)
            .await
    }

    pub async fn send_to_topic(
        &self,
        topic: &str,
        notification: &Notification,
        data: &HashMap<String, String>,
    ) -> PushResult<SendResult> {
        self.send(&Target::Topic(topic.to_string()), notification, data)
            .await
    }

    /// Send to every token. Never fails as a whole; failures are counted.
    pub async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
        data: &HashMap<String, String>,
    ) -> MulticastResult {
        let results = stream::iter(tokens.iter().cloned())
            .map(|token| async move {
                let result = self.send_to_token(&token, notification, data).await;
                (token, result)
            })
            .buffered(MULTICAST_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        MulticastResult::collect(results)
    }
}
