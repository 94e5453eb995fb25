//! Device token registration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use geo_common::GeoError;

use crate::error::geo_error_response;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterDevice {
    pub fcm_token: Option<String>,
    pub user_id: Option<String>,
    pub platform: Option<String>,
}

/// POST /devices/register
///
/// A malformed or missing body is treated as empty.
pub async fn register_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<RegisterDevice>>,
) -> Response {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let Some(token) = request.fcm_token.filter(|t| !t.trim().is_empty()) else {
        return geo_error_response(&GeoError::MissingParameter("fcm_token".to_string()));
    };

    match state
        .devices
        .register(
            &token,
            request.user_id.as_deref(),
            request.platform.as_deref(),
        )
        .await
    {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(e) => geo_error_response(&e),
    }
}
