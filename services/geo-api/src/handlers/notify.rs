//! Internal push-notification trigger.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use geo_common::GeoError;
use push::{FcmClient, Notification};

use crate::error::{error_response, geo_error_response};
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_TITLE: &str = "通知";
const MISSING_TARGET: &str = "need one of: token | tokens[] | topic | user_id";

#[derive(Debug, Default, Deserialize)]
pub struct NotifyRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Arbitrary key/value payload. FCM only accepts string values.
    #[serde(default)]
    pub data: Map<String, Value>,
    pub token: Option<String>,
    pub tokens: Option<Vec<String>>,
    pub topic: Option<String>,
    pub user_id: Option<String>,
}

/// Recipient of a notify request, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    Topic(String),
    Token(String),
    Tokens(Vec<String>),
    User(String),
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl NotifyRequest {
    pub fn notification(&self) -> Notification {
        Notification {
            title: non_empty(&self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: self.body.clone().unwrap_or_default(),
        }
    }

    /// `data` as FCM string pairs. Strings pass through, other scalars and
    /// nested values are sent as their JSON text, and nulls are dropped.
    pub fn data_strings(&self) -> HashMap<String, String> {
        self.data
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), value))
            })
            .collect()
    }

    pub fn target(&self) -> Option<NotifyTarget> {
        if let Some(topic) = non_empty(&self.topic) {
            return Some(NotifyTarget::Topic(topic));
        }
        if let Some(token) = non_empty(&self.token) {
            return Some(NotifyTarget::Token(token));
        }
        if let Some(tokens) = self.tokens.as_ref().filter(|t| !t.is_empty()) {
            return Some(NotifyTarget::Tokens(tokens.clone()));
        }
        non_empty(&self.user_id).map(NotifyTarget::User)
    }
}

/// True when no key is configured or the header matches it.
pub fn authorized(expected: Option<&str>, headers: &HeaderMap) -> bool {
    match expected {
        None => true,
        Some(expected) => headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|provided| provided == expected),
    }
}

async fn dispatch(
    state: &AppState,
    fcm: &FcmClient,
    target: NotifyTarget,
    notification: &Notification,
    data: &HashMap<String, String>,
) -> Response {
    let sent = match target {
        NotifyTarget::Topic(topic) => fcm
            .send_to_topic(&topic, notification, data)
            .await
            .map(|r| Json(r).into_response()),
        NotifyTarget::Token(token) => fcm
            .send_to_token(&token, notification, data)
            .await
            .map(|r| Json(r).into_response()),
        NotifyTarget::Tokens(tokens) => {
            Ok(Json(fcm.send_multicast(&tokens, notification, data).await).into_response())
        }
        NotifyTarget::User(user_id) => {
            let tokens = match state.devices.tokens_for_user(&user_id).await {
                Ok(tokens) => tokens,
                Err(e) => return geo_error_response(&e),
            };
            if tokens.is_empty() {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "success": false, "reason": "no tokens for user" })),
                )
                    .into_response();
            }
            info!(user_id = %user_id, devices = tokens.len(), "Notifying user devices");
            Ok(Json(fcm.send_multicast(&tokens, notification, data).await).into_response())
        }
    };

    sent.unwrap_or_else(|e| geo_error_response(&GeoError::from(e)))
}

/// POST /internal/notify
pub async fn notify_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<NotifyRequest>, JsonRejection>,
) -> Response {
    if !authorized(state.internal_api_key.as_deref(), &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "invalid api key");
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => NotifyRequest::default(),
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Some(target) = request.target() else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_TARGET);
    };
    let Some(fcm) = state.fcm.as_ref() else {
        return geo_error_response(&GeoError::ConfigError("FCM_PROJECT_ID not set".to_string()));
    };

    let data = request.data_strings();
    dispatch(&state, fcm, target, &request.notification(), &data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(value: serde_json::Value) -> NotifyRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_target_precedence() {
        let req = request(json!({ "token": "t", "topic": "alerts", "user_id": "u" }));
        assert_eq!(req.target(), Some(NotifyTarget::Topic("alerts".into())));

        let req = request(json!({ "token": "t", "tokens": ["a", "b"] }));
        assert_eq!(req.target(), Some(NotifyTarget::Token("t".into())));

        let req = request(json!({ "tokens": ["a", "b"], "user_id": "u" }));
        assert_eq!(
            req.target(),
            Some(NotifyTarget::Tokens(vec!["a".into(), "b".into()]))
        );

        let req = request(json!({ "tokens": [], "user_id": "u" }));
        assert_eq!(req.target(), Some(NotifyTarget::User("u".into())));
    }

    #[test]
    fn test_no_target() {
        assert_eq!(request(json!({ "title": "hi" })).target(), None);
        assert_eq!(request(json!({ "topic": "" })).target(), None);
    }

    #[test]
    fn test_default_title() {
        let notification = request(json!({ "body": "熱浪來襲" })).notification();
        assert_eq!(notification.title, "通知");
        assert_eq!(notification.body, "熱浪來襲");
    }

    #[test]
    fn test_data_values_become_strings() {
        let req = request(json!({
            "topic": "alerts",
            "data": {
                "level": 3,
                "pm25": 35.5,
                "urgent": true,
                "district": "大安區",
                "extra": null,
                "tags": ["heat"]
            }
        }));
        assert_eq!(req.target(), Some(NotifyTarget::Topic("alerts".into())));

        let data = req.data_strings();
        assert_eq!(data.len(), 5);
        assert_eq!(data["level"], "3");
        assert_eq!(data["pm25"], "35.5");
        assert_eq!(data["urgent"], "true");
        assert_eq!(data["district"], "大安區");
        assert_eq!(data["tags"], r#"["heat"]"#);
        assert!(!data.contains_key("extra"));
    }

    #[test]
    fn test_api_key_check() {
        let mut headers = HeaderMap::new();
        assert!(authorized(None, &headers));
        assert!(!authorized(Some("secret"), &headers));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(!authorized(Some("secret"), &headers));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(authorized(Some("secret"), &headers));
    }
}
