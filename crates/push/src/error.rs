use geo_common::GeoError;
use thiserror::Error;

pub type PushResult<T> = Result<T, PushError>;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("FCM_PROJECT_ID not set")]
    MissingProjectId,

    #[error("Failed to obtain access token: {0}")]
    Credentials(String),

    #[error("FCM request failed: {0}")]
    Http(String),
}

impl From<PushError> for GeoError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::MissingProjectId => GeoError::ConfigError(err.to_string()),
            other => GeoError::Upstream(other.to_string()),
        }
    }
}
