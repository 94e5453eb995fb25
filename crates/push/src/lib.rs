//! Firebase Cloud Messaging (HTTP v1) client.
//!
//! Credentials are injected as an [`AccessTokenProvider`]. Wrap the source in
//! a [`CachedTokenProvider`] so tokens are reused until shortly before they
//! expire.

mod error;
mod fcm;
mod token;

pub use error::{PushError, PushResult};
pub use fcm::{FcmClient, MulticastResult, Notification, SendResult, Target, TokenFailure};
pub use token::{
    AccessToken, AccessTokenProvider, CachedTokenProvider, MetadataServerTokenSource,
    StaticTokenSource, FCM_SCOPE, REFRESH_MARGIN,
};
