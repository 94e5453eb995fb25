use geo_common::GeoError;
use thiserror::Error;

pub type CwaResult<T> = Result<T, CwaError>;

#[derive(Debug, Error)]
pub enum CwaError {
    #[error("CWA_API_KEY not set")]
    MissingApiKey,

    #[error("CWA request failed: {0}")]
    Http(String),

    #[error("CWA returned status {0}")]
    Status(u16),

    #[error("Invalid CWA payload: {0}")]
    Decode(String),
}

impl From<CwaError> for GeoError {
    fn from(err: CwaError) -> Self {
        match err {
            CwaError::MissingApiKey => GeoError::ConfigError(err.to_string()),
            other => GeoError::Upstream(other.to_string()),
        }
    }
}
