//! Error types for the city-safety services.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Primary error type for lookup and cache operations.
#[derive(Debug, Error)]
pub enum GeoError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Upstream Errors ===
    /// Every candidate reference time failed; nothing was cached.
    #[error("Upstream data unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A single upstream call (forecast, push) failed.
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GeoError {
    /// Shorthand for an [`GeoError::InvalidParameter`].
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        GeoError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            GeoError::MissingParameter(_) | GeoError::InvalidParameter { .. } => 400,

            GeoError::UpstreamUnavailable(_) | GeoError::Upstream(_) => 502,

            _ => 500,
        }
    }

    /// True when the failure originates outside this service and a retry later may succeed.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GeoError::UpstreamUnavailable(_) | GeoError::Upstream(_)
        )
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::InternalError(format!("JSON error: {}", err))
    }
}

/// Failure of one upstream fetch attempt for a single reference time.
///
/// The measurement cache treats every variant the same way (try the next
/// older reference), the distinction only matters for logging.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("upstream rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),

    #[error("no data for reference: {0}")]
    NoData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GeoError::invalid("lat", "not a number").http_status_code(), 400);
        assert_eq!(
            GeoError::UpstreamUnavailable("all refs failed".into()).http_status_code(),
            502
        );
        assert_eq!(GeoError::DatabaseError("down".into()).http_status_code(), 500);
    }

    #[test]
    fn test_upstream_is_distinct_from_store_failure() {
        assert!(GeoError::UpstreamUnavailable("x".into()).is_upstream());
        assert!(!GeoError::DatabaseError("x".into()).is_upstream());
    }
}
