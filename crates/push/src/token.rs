//! OAuth access tokens for the FCM API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{PushError, PushResult};

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Tokens are refreshed this long before their reported expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Lifetimes shorter than this are rounded up. Must exceed [`REFRESH_MARGIN`].
const MIN_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// True while the token is usable at `now` with the refresh margin applied.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::from_std(REFRESH_MARGIN).unwrap_or_default();
        self.expires_at - margin > now
    }
}

/// Expiry of a token issued at `now` with the reported lifetime.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + chrono::Duration::seconds(expires_in.max(MIN_TTL.as_secs() as i64))
}

/// Anything that can hand out a bearer token for FCM.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> PushResult<AccessToken>;
}

#[async_trait]
impl<P: AccessTokenProvider + ?Sized> AccessTokenProvider for Arc<P> {
    async fn access_token(&self) -> PushResult<AccessToken> {
        (**self).access_token().await
    }
}

/// A fixed token, e.g. from `FCM_ACCESS_TOKEN` during local development.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenSource {
    async fn access_token(&self) -> PushResult<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: DateTime::<Utc>::MAX_UTC,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: i64,
}

/// Service-account token from the GCE / Cloud Run metadata server.
#[derive(Debug, Clone)]
pub struct MetadataServerTokenSource {
    client: Client,
    url: String,
}

impl MetadataServerTokenSource {
    pub fn new() -> PushResult<Self> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: &str) -> PushResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PushError::Credentials(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for MetadataServerTokenSource {
    #[instrument(skip(self))]
    async fn access_token(&self) -> PushResult<AccessToken> {
        let now = Utc::now();
        let response = self
            .client
            .get(&self.url)
            .query(&[("scopes", FCM_SCOPE)])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| PushError::Credentials(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Credentials(format!(
                "metadata server returned {}",
                status
            )));
        }

        let body: MetadataToken = response
            .json()
            .await
            .map_err(|e| PushError::Credentials(format!("Invalid token response: {}", e)))?;

        debug!(expires_in = body.expires_in, "Fetched access token");
        Ok(AccessToken {
            token: body.access_token,
            expires_at: expiry(now, body.expires_in),
        })
    }
}

/// Reuses the inner provider's token until [`REFRESH_MARGIN`] before expiry.
///
/// Concurrent callers that find the cache stale wait on one refresh.
pub struct CachedTokenProvider<P> {
    inner: P,
    cached: Mutex<Option<AccessToken>>,
}

impl<P: AccessTokenProvider> CachedTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token_at(&self, now: DateTime<Utc>) -> PushResult<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.clone());
        }

        let token = self.inner.access_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl<P: AccessTokenProvider> AccessTokenProvider for CachedTokenProvider<P> {
    async fn access_token(&self) -> PushResult<AccessToken> {
        self.access_token_at(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        expires_at: DateTime<Utc>,
    }

    #[async_trait]
    impl AccessTokenProvider for CountingSource {
        async fn access_token(&self) -> PushResult<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_at: self.expires_at,
            })
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, m, s).unwrap()
    }

    fn provider() -> CachedTokenProvider<CountingSource> {
        CachedTokenProvider::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_at: at(4, 0, 0),
        })
    }

    #[tokio::test]
    async fn test_token_reused_while_fresh() {
        let provider = provider();
        let a = provider.access_token_at(at(3, 0, 0)).await.unwrap();
        let b = provider.access_token_at(at(3, 58, 59)).await.unwrap();

        assert_eq!(a.token, "token-1");
        assert_eq!(b.token, "token-1");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_refreshed_inside_margin() {
        let provider = provider();
        provider.access_token_at(at(3, 0, 0)).await.unwrap();
        let refreshed = provider.access_token_at(at(3, 59, 0)).await.unwrap();

        assert_eq!(refreshed.token, "token-2");
    }

    #[test]
    fn test_short_lifetime_still_fresh_when_issued() {
        assert!(MIN_TTL > REFRESH_MARGIN);

        let issued = at(3, 0, 0);
        for expires_in in [-5, 0, 30, 60] {
            let token = AccessToken {
                token: "short".into(),
                expires_at: expiry(issued, expires_in),
            };
            assert!(token.is_fresh(issued), "expires_in={}", expires_in);
            assert!(token.is_fresh(at(3, 0, 59)), "expires_in={}", expires_in);
        }

        let long = expiry(issued, 3599);
        assert_eq!(long, at(3, 59, 59));
    }

    #[tokio::test]
    async fn test_short_lived_token_reused_across_sends() {
        let provider = CachedTokenProvider::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_at: expiry(at(3, 0, 0), 45),
        });
        provider.access_token_at(at(3, 0, 0)).await.unwrap();
        let again = provider.access_token_at(at(3, 0, 30)).await.unwrap();

        assert_eq!(again.token, "token-1");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_token_never_expires() {
        let token = StaticTokenSource::new("dev").access_token().await.unwrap();
        assert_eq!(token.token, "dev");
        assert!(token.is_fresh(at(23, 59, 59)));
    }

    #[test]
    fn test_metadata_response_parses() {
        let body: MetadataToken = serde_json::from_str(
            r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(body.access_token, "ya29.abc");
        assert_eq!(body.expires_in, 3599);
    }
}
