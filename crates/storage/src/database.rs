//! Connection pool and migrations.

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use geo_common::{GeoError, GeoResult};

use crate::schema::SCHEMA_SQL;
use crate::{DeviceRegistry, PgMeasurementStore, PgSpatialStore};

/// Database connection pool.
///
/// Cheap to clone; every store handed out shares the same pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> GeoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Build the pool without connecting; connections open on first use.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> GeoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|e| GeoError::DatabaseError(format!("Invalid database URL: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> GeoResult<()> {
        // Statements are executed one at a time; the schema has no function bodies.
        let mut applied = 0;
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| GeoError::DatabaseError(format!("Migration failed: {}", e)))?;
                applied += 1;
            }
        }

        info!(statements = applied, "Schema up to date");
        Ok(())
    }

    /// Round trip to the database, for readiness checks.
    pub async fn ping(&self) -> GeoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    pub fn spatial(&self) -> PgSpatialStore {
        PgSpatialStore::new(self.pool.clone())
    }

    pub fn measurements(&self) -> PgMeasurementStore {
        PgMeasurementStore::new(self.pool.clone())
    }

    pub fn devices(&self) -> DeviceRegistry {
        DeviceRegistry::new(self.pool.clone())
    }
}
