//! Bucketed PM2.5/AQI cache in front of the upstream atmospheric source.
//!
//! Rows are keyed two ways. A (slot, space bucket) link serves identical
//! answers to nearby requests; the (slot, upstream grid point) uniqueness
//! keeps two buckets that land on the same grid cell from storing the same
//! expensive fetch twice.
//!
//! Per request:
//!
//! 1. Hit on (slot, bucket): return it.
//! 2. Miss, and none of `force`, slot boundary, or first-ever query for the
//!    bucket: return the latest earlier row for the bucket, marked stale.
//! 3. Otherwise fetch, newest candidate run first, each attempt under its own
//!    timeout. Reuse a row already stored for the same grid point, else
//!    insert-or-read-back, then link the bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use geo_common::bucket::DEFAULT_BUCKET_DECIMALS;
use geo_common::{
    BoundingBox, FetchError, GeoError, GeoResult, GridSample, MeasurementRecord,
    MeasurementStore, NewMeasurement, Point, RunReference, SlotGrid, SpaceBucket, TimeSlot,
    UpstreamFetcher,
};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::aqi::pm25_to_aqi;

/// Default bound on a single upstream attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(90);

/// Tunables of the cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Area requested from upstream.
    pub area: BoundingBox,
    pub slots: SlotGrid,
    pub bucket_decimals: u32,
    pub attempt_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            area: BoundingBox::taipei(),
            slots: SlotGrid::default(),
            bucket_decimals: DEFAULT_BUCKET_DECIMALS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// How a measurement was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementSource {
    /// Row already linked to this (slot, bucket).
    Cache,
    /// Latest row from an earlier slot.
    Stale,
    /// Fetched upstream during this request.
    Upstream,
}

impl MeasurementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementSource::Cache => "cache",
            MeasurementSource::Stale => "stale",
            MeasurementSource::Upstream => "upstream",
        }
    }
}

/// A cache answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub bucket: SpaceBucket,
    /// Slot of the request. For stale answers `record.slot` is older.
    pub requested_slot: TimeSlot,
    pub record: MeasurementRecord,
    pub source: MeasurementSource,
    offset: FixedOffset,
}

impl Measurement {
    pub fn is_stale(&self) -> bool {
        self.source == MeasurementSource::Stale
    }

    pub fn slot_utc(&self) -> DateTime<Utc> {
        self.record.slot.start_utc()
    }

    pub fn slot_local(&self) -> DateTime<FixedOffset> {
        self.record.slot.start_local(self.offset)
    }

    pub fn reference(&self) -> &str {
        &self.record.reference
    }
}

/// The AQI cache.
///
/// Holds the upstream fetcher and settings only; the measurement store is
/// passed to each call.
pub struct MeasurementCache {
    fetcher: Arc<dyn UpstreamFetcher>,
    settings: CacheSettings,
}

impl MeasurementCache {
    pub fn new(fetcher: Arc<dyn UpstreamFetcher>, settings: CacheSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Measurement for `point` now.
    pub async fn get<S>(&self, store: &S, point: Point, force: bool) -> GeoResult<Measurement>
    where
        S: MeasurementStore + ?Sized,
    {
        self.get_at(store, point, force, Utc::now()).await
    }

    /// Measurement for `point` as of `now`.
    #[instrument(skip(self, store), fields(lat = point.lat, lon = point.lon))]
    pub async fn get_at<S>(
        &self,
        store: &S,
        point: Point,
        force: bool,
        now: DateTime<Utc>,
    ) -> GeoResult<Measurement>
    where
        S: MeasurementStore + ?Sized,
    {
        let bucket = SpaceBucket::from_point(&point, self.settings.bucket_decimals);
        let slot = self.settings.slots.slot_for(now);

        if let Some(record) = store.find_by_bucket(&slot, &bucket).await? {
            counter!("aqi_cache_hits_total").increment(1);
            debug!(id = record.id, "Cache hit");
            return Ok(self.answer(bucket, slot, record, MeasurementSource::Cache));
        }

        let on_boundary = self.settings.slots.is_boundary(now);
        if !force && !on_boundary {
            if let Some(record) = store.latest_before(&bucket, &slot).await? {
                counter!("aqi_cache_stale_total").increment(1);
                debug!(
                    id = record.id,
                    record_slot = %record.slot.start_utc(),
                    "Serving previous slot"
                );
                return Ok(self.answer(bucket, slot, record, MeasurementSource::Stale));
            }
        }

        debug!(force, on_boundary, "Cache miss, fetching upstream");
        let (reference, sample) = self.fetch_latest(&bucket.center(), now).await?;
        let record = self.store_sample(store, slot, reference, sample, now).await?;
        store.link_bucket(&slot, &bucket, record.id).await?;

        Ok(self.answer(bucket, slot, record, MeasurementSource::Upstream))
    }

    fn answer(
        &self,
        bucket: SpaceBucket,
        requested_slot: TimeSlot,
        record: MeasurementRecord,
        source: MeasurementSource,
    ) -> Measurement {
        Measurement {
            bucket,
            requested_slot,
            record,
            source,
            offset: self.settings.slots.offset(),
        }
    }

    /// Try candidate runs newest first; the first usable grid wins.
    async fn fetch_latest(
        &self,
        point: &Point,
        now: DateTime<Utc>,
    ) -> GeoResult<(RunReference, GridSample)> {
        let candidates = RunReference::candidates(now);

        for reference in &candidates {
            match self.attempt(reference, point).await {
                Ok(sample) => {
                    counter!("aqi_upstream_fetches_total", "outcome" => "success").increment(1);
                    info!(
                        reference = %reference.label(),
                        grid_lat = sample.grid_point.lat,
                        grid_lon = sample.grid_point.lon,
                        "Fetched upstream grid"
                    );
                    return Ok((*reference, sample));
                }
                Err(e) => {
                    let outcome = match e {
                        FetchError::Timeout(_) => "timeout",
                        _ => "failed",
                    };
                    counter!("aqi_upstream_fetches_total", "outcome" => outcome).increment(1);
                    warn!(reference = %reference.label(), error = %e, "Upstream attempt failed");
                }
            }
        }

        Err(GeoError::UpstreamUnavailable(format!(
            "no data for any of {} candidate runs",
            candidates.len()
        )))
    }

    async fn attempt(
        &self,
        reference: &RunReference,
        point: &Point,
    ) -> Result<GridSample, FetchError> {
        let timeout = self.settings.attempt_timeout;
        let fetch = self.fetcher.fetch(reference, &self.settings.area);
        let grid = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        grid.into_micrograms()
            .nearest(point)
            .ok_or_else(|| FetchError::NoData(format!("empty grid for {}", reference.label())))
    }

    /// Persist a fetched sample, reusing any row for the same grid point.
    async fn store_sample<S>(
        &self,
        store: &S,
        slot: TimeSlot,
        reference: RunReference,
        sample: GridSample,
        now: DateTime<Utc>,
    ) -> GeoResult<MeasurementRecord>
    where
        S: MeasurementStore + ?Sized,
    {
        if let Some(existing) = store.find_by_grid_point(&slot, &sample.grid_point).await? {
            debug!(id = existing.id, "Grid point already stored for slot");
            return Ok(existing);
        }

        let reading = pm25_to_aqi(sample.value);
        let outcome = store
            .insert_or_get(NewMeasurement {
                slot,
                grid_point: sample.grid_point,
                pm25_ugm3: sample.value,
                aqi: reading.aqi,
                category: reading.category,
                reference: reference.label(),
                fetched_at: now,
            })
            .await?;

        if !outcome.was_inserted() {
            debug!("Concurrent insert won, using stored row");
        }
        Ok(outcome.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo_common::AqiCategory;
    use test_utils::{
        assert_approx_eq, taipei_pm25_grid, FetchBehavior, MemoryMeasurementStore, ScriptedFetcher,
    };

    // 03:23 UTC is 11:23 local, not on a slot boundary.
    fn mid_slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 3, 23, 0).unwrap()
    }

    fn cache(fetcher: Arc<ScriptedFetcher>) -> MeasurementCache {
        MeasurementCache::new(
            fetcher,
            CacheSettings {
                attempt_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        )
    }

    const TAIPEI_101: Point = Point { lat: 25.0340, lon: 121.5645 };

    #[tokio::test]
    async fn test_first_query_fetches_and_normalizes() {
        let fetcher = Arc::new(ScriptedFetcher::returning(taipei_pm25_grid()));
        let store = MemoryMeasurementStore::new();

        let m = cache(fetcher.clone())
            .get_at(&store, TAIPEI_101, false, mid_slot())
            .await
            .unwrap();

        assert_eq!(m.source, MeasurementSource::Upstream);
        assert!(!m.is_stale());
        // Nearest cell is (24.9, 121.7) at 160 µg m-3.
        assert_approx_eq!(m.record.pm25_ugm3, 160.0, 1e-6);
        assert_eq!(m.record.category, AqiCategory::VeryUnhealthy);
        assert_eq!(m.reference(), "2025-07-01 12:00 UTC");
        assert_eq!(m.slot_utc(), Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 0).unwrap());
        assert_eq!(m.slot_local().to_rfc3339(), "2025-07-01T11:20:00+08:00");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_through_candidates() {
        let fetcher = Arc::new(
            ScriptedFetcher::failing()
                .on("2025-06-30 12:00 UTC", FetchBehavior::Succeed(taipei_pm25_grid())),
        );
        let store = MemoryMeasurementStore::new();

        let m = cache(fetcher.clone())
            .get_at(&store, TAIPEI_101, false, mid_slot())
            .await
            .unwrap();

        assert_eq!(m.reference(), "2025-06-30 12:00 UTC");
        assert_eq!(
            fetcher.attempted(),
            vec![
                "2025-07-01 12:00 UTC",
                "2025-07-01 00:00 UTC",
                "2025-06-30 12:00 UTC",
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_candidate() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(taipei_pm25_grid())
                .on("2025-07-01 12:00 UTC", FetchBehavior::Hang),
        );
        let store = MemoryMeasurementStore::new();

        let m = cache(fetcher.clone())
            .get_at(&store, TAIPEI_101, false, mid_slot())
            .await
            .unwrap();

        assert_eq!(m.reference(), "2025-07-01 00:00 UTC");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_candidates_fail_caches_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::failing());
        let store = MemoryMeasurementStore::new();

        let err = cache(fetcher.clone())
            .get_at(&store, TAIPEI_101, false, mid_slot())
            .await
            .unwrap_err();

        assert!(matches!(err, GeoError::UpstreamUnavailable(_)));
        assert_eq!(fetcher.calls(), 4);
        assert_eq!(store.row_count(), 0);
        assert_eq!(store.link_count(), 0);
    }

    #[tokio::test]
    async fn test_store_error_is_not_upstream_error() {
        let fetcher = Arc::new(ScriptedFetcher::returning(taipei_pm25_grid()));
        let store = MemoryMeasurementStore::new();
        store.set_failing(true);

        let err = cache(fetcher.clone())
            .get_at(&store, TAIPEI_101, false, mid_slot())
            .await
            .unwrap_err();

        assert!(matches!(err, GeoError::DatabaseError(_)));
        assert_eq!(fetcher.calls(), 0);
    }
}
