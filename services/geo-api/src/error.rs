//! JSON error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use geo_common::GeoError;

/// `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Map a lookup failure to a response.
///
/// Internal failures are logged in full and reported without detail.
pub fn geo_error_response(err: &GeoError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() && !err.is_upstream() {
        error!(error = %err, "Request failed");
        return error_response(status, "internal server error");
    }
    if err.is_upstream() {
        warn!(error = %err, "Upstream failure");
    }
    error_response(status, client_message(err))
}

fn client_message(err: &GeoError) -> String {
    match err {
        GeoError::InvalidParameter { message, .. } => message.clone(),
        GeoError::MissingParameter(name) => format!("{} required", name),
        other => other.to_string(),
    }
}

/// JSON body with an explicit content type, e.g. `application/geo+json`.
pub fn json_with_type(
    status: StatusCode,
    content_type: &'static str,
    body: &impl serde::Serialize,
) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = (status, bytes).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Err(e) => geo_error_response(&GeoError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            geo_error_response(&GeoError::invalid("lat", "lat/lon required")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            geo_error_response(&GeoError::UpstreamUnavailable("all failed".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            geo_error_response(&GeoError::DatabaseError("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_message_hides_parameter_name() {
        assert_eq!(
            client_message(&GeoError::invalid("limit", "invalid limit (must be 1-100)")),
            "invalid limit (must be 1-100)"
        );
        assert_eq!(
            client_message(&GeoError::MissingParameter("fcm_token".into())),
            "fcm_token required"
        );
    }

    #[test]
    fn test_geojson_content_type() {
        let response = json_with_type(
            StatusCode::OK,
            "application/geo+json",
            &json!({ "type": "FeatureCollection", "features": [] }),
        );
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/geo+json"
        );
    }
}
