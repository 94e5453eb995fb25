//! AQI cache tables.
//!
//! `aqi_measurements` holds one row per (slot, grid point); the unique
//! constraint on that pair is what resolves concurrent inserts.
//! `aqi_bucket_index` links (slot, space bucket) to a measurement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use geo_common::{
    GeoError, GeoResult, GridPointKey, InsertOutcome, MeasurementRecord, MeasurementStore,
    NewMeasurement, SpaceBucket, TimeSlot,
};

const MEASUREMENT_COLUMNS: &str = "m.id, m.slot_utc, m.grid_lat, m.grid_lon, m.pm25_ugm3, \
     m.aqi, m.category, m.reference, m.fetched_at";

#[derive(Debug, FromRow)]
struct MeasurementRow {
    id: i64,
    slot_utc: DateTime<Utc>,
    grid_lat: f64,
    grid_lon: f64,
    pm25_ugm3: f64,
    aqi: i32,
    category: String,
    reference: String,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<MeasurementRow> for MeasurementRecord {
    type Error = GeoError;

    fn try_from(row: MeasurementRow) -> Result<Self, Self::Error> {
        Ok(MeasurementRecord {
            id: row.id,
            slot: TimeSlot::from_stored(row.slot_utc),
            grid_point: GridPointKey::new(row.grid_lat, row.grid_lon),
            pm25_ugm3: row.pm25_ugm3,
            aqi: row.aqi,
            category: row.category.parse()?,
            reference: row.reference,
            fetched_at: row.fetched_at,
        })
    }
}

fn into_record(row: Option<MeasurementRow>) -> GeoResult<Option<MeasurementRecord>> {
    row.map(MeasurementRecord::try_from).transpose()
}

/// [`MeasurementStore`] over PostgreSQL.
#[derive(Clone)]
pub struct PgMeasurementStore {
    pool: PgPool,
}

impl PgMeasurementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeasurementStore for PgMeasurementStore {
    async fn find_by_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
    ) -> GeoResult<Option<MeasurementRecord>> {
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM aqi_bucket_index b \
             JOIN aqi_measurements m ON m.id = b.measurement_id \
             WHERE b.slot_utc = $1 AND b.bucket_lat = $2 AND b.bucket_lon = $3 AND b.decimals = $4"
        );
        let row = sqlx::query_as::<_, MeasurementRow>(&sql)
            .bind(slot.start_utc())
            .bind(bucket.lat_key)
            .bind(bucket.lon_key)
            .bind(bucket.decimals as i16)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        into_record(row)
    }

    async fn latest_before(
        &self,
        bucket: &SpaceBucket,
        before: &TimeSlot,
    ) -> GeoResult<Option<MeasurementRecord>> {
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM aqi_bucket_index b \
             JOIN aqi_measurements m ON m.id = b.measurement_id \
             WHERE b.bucket_lat = $1 AND b.bucket_lon = $2 AND b.decimals = $3 \
             AND b.slot_utc < $4 \
             ORDER BY b.slot_utc DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, MeasurementRow>(&sql)
            .bind(bucket.lat_key)
            .bind(bucket.lon_key)
            .bind(bucket.decimals as i16)
            .bind(before.start_utc())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        into_record(row)
    }

    async fn find_by_grid_point(
        &self,
        slot: &TimeSlot,
        grid_point: &GridPointKey,
    ) -> GeoResult<Option<MeasurementRecord>> {
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM aqi_measurements m \
             WHERE m.slot_utc = $1 AND m.grid_lat = $2 AND m.grid_lon = $3"
        );
        let row = sqlx::query_as::<_, MeasurementRow>(&sql)
            .bind(slot.start_utc())
            .bind(grid_point.lat)
            .bind(grid_point.lon)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GeoError::DatabaseError(format!("Query failed: {}", e)))?;

        into_record(row)
    }

    async fn insert_or_get(&self, measurement: NewMeasurement) -> GeoResult<InsertOutcome> {
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO aqi_measurements (
                slot_utc, grid_lat, grid_lon,
                pm25_ugm3, aqi, category, reference, fetched_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (slot_utc, grid_lat, grid_lon) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(measurement.slot.start_utc())
        .bind(measurement.grid_point.lat)
        .bind(measurement.grid_point.lon)
        .bind(measurement.pm25_ugm3)
        .bind(measurement.aqi)
        .bind(measurement.category.label())
        .bind(&measurement.reference)
        .bind(measurement.fetched_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GeoError::DatabaseError(format!("Insert failed: {}", e)))?;

        if let Some((id,)) = inserted {
            return Ok(InsertOutcome::Inserted(MeasurementRecord::from_new(
                id,
                measurement,
            )));
        }

        debug!(
            slot = %measurement.slot.start_utc(),
            grid_lat = measurement.grid_point.lat,
            grid_lon = measurement.grid_point.lon,
            "Measurement already stored, reading back"
        );
        self.find_by_grid_point(&measurement.slot, &measurement.grid_point)
            .await?
            .map(InsertOutcome::Existing)
            .ok_or_else(|| {
                GeoError::DatabaseError(
                    "Conflicting measurement disappeared before read-back".to_string(),
                )
            })
    }

    async fn link_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
        measurement_id: i64,
    ) -> GeoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO aqi_bucket_index (
                slot_utc, bucket_lat, bucket_lon, decimals, measurement_id
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slot_utc, bucket_lat, bucket_lon, decimals) DO NOTHING
            "#,
        )
        .bind(slot.start_utc())
        .bind(bucket.lat_key)
        .bind(bucket.lon_key)
        .bind(bucket.decimals as i16)
        .bind(measurement_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GeoError::DatabaseError(format!("Insert failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo_common::AqiCategory;

    fn row(category: &str) -> MeasurementRow {
        MeasurementRow {
            id: 7,
            slot_utc: Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 0).unwrap(),
            grid_lat: 24.9,
            grid_lon: 121.7,
            pm25_ugm3: 18.25,
            aqi: 64,
            category: category.to_string(),
            reference: "2025-07-01 00:00 UTC".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2025, 7, 1, 3, 21, 4).unwrap(),
        }
    }

    #[test]
    fn test_row_into_record() {
        let record = MeasurementRecord::try_from(row("Moderate")).unwrap();
        assert_eq!(record.category, AqiCategory::Moderate);
        assert_eq!(record.grid_point, GridPointKey::new(24.9, 121.7));
        assert_eq!(
            record.slot.start_utc(),
            Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_category_is_an_error() {
        assert!(MeasurementRecord::try_from(row("Spicy")).is_err());
    }
}
