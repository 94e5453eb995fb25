//! HTTP request handlers for the city-safety API.

pub mod aqi;
pub mod devices;
pub mod districts;
pub mod forecast;
pub mod health;
pub mod notify;
pub mod sites;

use axum::{response::IntoResponse, response::Response, Json};
use serde_json::json;

/// Body returned when a lookup has nothing to report.
pub(crate) fn no_data() -> Response {
    Json(json!({ "note": "no data" })).into_response()
}
