//! FCM device token registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use geo_common::{GeoError, GeoResult};

/// A registered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeviceRegistration {
    pub fcm_token: String,
    pub user_id: Option<String>,
    pub platform: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DeviceRegistry {
    pool: PgPool,
}

impl DeviceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a token or re-point an existing one at `user_id`/`platform`.
    pub async fn register(
        &self,
        fcm_token: &str,
        user_id: Option<&str>,
        platform: Option<&str>,
    ) -> GeoResult<DeviceRegistration> {
        if fcm_token.trim().is_empty() {
            return Err(GeoError::MissingParameter("fcm_token".to_string()));
        }

        let registration = sqlx::query_as::<_, DeviceRegistration>(
            r#"
            INSERT INTO device_tokens (fcm_token, user_id, platform, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (fcm_token) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                platform = EXCLUDED.platform,
                updated_at = EXCLUDED.updated_at
            RETURNING fcm_token, user_id, platform, updated_at
            "#,
        )
        .bind(fcm_token)
        .bind(user_id)
        .bind(platform)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GeoError::DatabaseError(format!("Upsert failed: {}", e)))?;

        debug!(user_id = ?user_id, platform = ?platform, "Registered device");
        Ok(registration)
    }

    /// All tokens registered to `user_id`.
    pub async fn tokens_for_user(&self, user_id: &str) -> GeoResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT fcm_token FROM device_tokens WHERE user_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(|(token,)| token).collect())
    }
}
