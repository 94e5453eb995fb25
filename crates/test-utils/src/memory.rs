//! In-memory store implementations.
//!
//! Both stores mirror the guarantees of the PostGIS schema closely enough
//! for the core lookups to be tested without a database: surface distances
//! for radius queries, index-style ordering for KNN, and uniqueness of
//! measurements per (slot, grid point).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use geo::{Closest, ClosestPoint, Contains, MultiPolygon};
use geo_common::{
    GeoError, GeoResult, GridPointKey, InsertOutcome, MeasurementRecord, MeasurementStore,
    NewMeasurement, Point, Region, Site, SiteCategory, SiteMatch, SpaceBucket, SpatialStore,
    TimeSlot,
};

fn to_geo(point: &Point) -> geo::Point<f64> {
    geo::Point::new(point.lon, point.lat)
}

/// Surface distance from `point` to the closest point of `shape`, zero inside.
fn distance_to_shape(point: &Point, shape: &MultiPolygon<f64>) -> Option<f64> {
    let query = to_geo(point);
    if shape.contains(&query) {
        return Some(0.0);
    }
    match shape.closest_point(&query) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => {
            Some(point.distance_to(&Point::new(p.y(), p.x())))
        }
        Closest::Indeterminate => None,
    }
}

/// Squared planar distance in degrees, the ordering a GiST `<->` index uses.
fn index_distance(a: &Point, b: &Point) -> f64 {
    (a.lat - b.lat).powi(2) + (a.lon - b.lon).powi(2)
}

/// Spatial store backed by `geo` geometries.
#[derive(Default)]
pub struct MemorySpatialStore {
    regions: Vec<(Region, MultiPolygon<f64>)>,
    sites: Vec<Site>,
    knn_queries: AtomicUsize,
    fail: AtomicBool,
}

impl MemorySpatialStore {
    pub fn new(regions: Vec<(Region, MultiPolygon<f64>)>, sites: Vec<Site>) -> Self {
        Self {
            regions,
            sites,
            ..Default::default()
        }
    }

    /// Number of unconstrained nearest-site queries served so far.
    pub fn knn_queries(&self) -> usize {
        self.knn_queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent query fail with a database error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> GeoResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GeoError::DatabaseError("connection refused".to_string()));
        }
        Ok(())
    }

    fn region_distances(&self, point: &Point) -> Vec<(Region, f64)> {
        let mut out: Vec<(Region, f64)> = self
            .regions
            .iter()
            .filter_map(|(region, shape)| {
                distance_to_shape(point, shape).map(|d| (region.clone(), d))
            })
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out
    }

    fn sites_of(&self, category: SiteCategory) -> impl Iterator<Item = &Site> {
        self.sites.iter().filter(move |s| s.category() == category)
    }
}

#[async_trait]
impl SpatialStore for MemorySpatialStore {
    async fn region_containing(&self, point: &Point) -> GeoResult<Option<Region>> {
        self.check()?;
        let query = to_geo(point);
        Ok(self
            .regions
            .iter()
            .find(|(_, shape)| shape.contains(&query))
            .map(|(region, _)| region.clone()))
    }

    async fn nearest_region_within(
        &self,
        point: &Point,
        max_distance_m: f64,
    ) -> GeoResult<Option<(Region, f64)>> {
        self.check()?;
        Ok(self
            .region_distances(point)
            .into_iter()
            .find(|(_, d)| *d <= max_distance_m))
    }

    async fn nearest_region(&self, point: &Point) -> GeoResult<Option<(Region, f64)>> {
        self.check()?;
        Ok(self.region_distances(point).into_iter().next())
    }

    async fn sites_within(
        &self,
        category: SiteCategory,
        point: &Point,
        radius_m: f64,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>> {
        self.check()?;
        let mut matches: Vec<SiteMatch> = self
            .sites_of(category)
            .map(|site| SiteMatch {
                distance_m: point.distance_to(&site.location),
                site: site.clone(),
            })
            .filter(|m| m.distance_m <= radius_m)
            .collect();
        matches.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn nearest_sites(
        &self,
        category: SiteCategory,
        point: &Point,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>> {
        self.check()?;
        self.knn_queries.fetch_add(1, Ordering::SeqCst);
        let mut sites: Vec<&Site> = self.sites_of(category).collect();
        sites.sort_by(|a, b| {
            index_distance(point, &a.location).total_cmp(&index_distance(point, &b.location))
        });
        Ok(sites
            .into_iter()
            .take(limit)
            .map(|site| SiteMatch {
                distance_m: point.distance_to(&site.location),
                site: site.clone(),
            })
            .collect())
    }

    async fn list_sites(
        &self,
        category: SiteCategory,
        limit: Option<usize>,
        offset: usize,
    ) -> GeoResult<Vec<Site>> {
        self.check()?;
        let mut sites: Vec<Site> = self.sites_of(category).cloned().collect();
        sites.sort_by_key(|s| s.id);
        let limit = limit.unwrap_or(usize::MAX);
        Ok(sites.into_iter().skip(offset).take(limit).collect())
    }
}

#[derive(Default)]
struct MeasurementTables {
    rows: Vec<MeasurementRecord>,
    links: HashMap<(TimeSlot, SpaceBucket), i64>,
    next_id: i64,
}

impl MeasurementTables {
    fn by_id(&self, id: i64) -> Option<&MeasurementRecord> {
        self.rows.iter().find(|r| r.id == id)
    }
}

/// Measurement store with the (slot, grid point) uniqueness of the real table.
#[derive(Default)]
pub struct MemoryMeasurementStore {
    tables: Mutex<MeasurementTables>,
    fail: AtomicBool,
}

impl MemoryMeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Seed a row and link it to `bucket`, bypassing the cache logic.
    pub fn seed(&self, measurement: NewMeasurement, bucket: SpaceBucket) -> MeasurementRecord {
        let mut tables = self.lock();
        tables.next_id += 1;
        let record = MeasurementRecord::from_new(tables.next_id, measurement);
        tables.links.insert((record.slot, bucket), record.id);
        tables.rows.push(record.clone());
        record
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MeasurementTables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> GeoResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GeoError::DatabaseError("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MeasurementStore for MemoryMeasurementStore {
    async fn find_by_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
    ) -> GeoResult<Option<MeasurementRecord>> {
        self.check()?;
        let tables = self.lock();
        Ok(tables
            .links
            .get(&(*slot, *bucket))
            .and_then(|id| tables.by_id(*id))
            .cloned())
    }

    async fn latest_before(
        &self,
        bucket: &SpaceBucket,
        before: &TimeSlot,
    ) -> GeoResult<Option<MeasurementRecord>> {
        self.check()?;
        let tables = self.lock();
        Ok(tables
            .links
            .iter()
            .filter(|((slot, b), _)| b == bucket && slot < before)
            .max_by_key(|((slot, _), _)| *slot)
            .and_then(|(_, id)| tables.by_id(*id))
            .cloned())
    }

    async fn find_by_grid_point(
        &self,
        slot: &TimeSlot,
        grid_point: &GridPointKey,
    ) -> GeoResult<Option<MeasurementRecord>> {
        self.check()?;
        Ok(self
            .lock()
            .rows
            .iter()
            .find(|r| r.slot == *slot && r.grid_point.bits() == grid_point.bits())
            .cloned())
    }

    async fn insert_or_get(&self, measurement: NewMeasurement) -> GeoResult<InsertOutcome> {
        self.check()?;
        let mut tables = self.lock();
        if let Some(existing) = tables.rows.iter().find(|r| {
            r.slot == measurement.slot && r.grid_point.bits() == measurement.grid_point.bits()
        }) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        tables.next_id += 1;
        let record = MeasurementRecord::from_new(tables.next_id, measurement);
        tables.rows.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn link_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
        measurement_id: i64,
    ) -> GeoResult<()> {
        self.check()?;
        self.lock()
            .links
            .entry((*slot, *bucket))
            .or_insert(measurement_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use chrono::{TimeZone, Utc};
    use geo_common::{AqiCategory, SlotGrid};

    fn new_measurement(slot: TimeSlot, lat: f64, lon: f64) -> NewMeasurement {
        NewMeasurement {
            slot,
            grid_point: GridPointKey::new(lat, lon),
            pm25_ugm3: 10.0,
            aqi: 42,
            category: AqiCategory::Good,
            reference: "2025-07-01 00:00 UTC".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2025, 7, 1, 3, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_region_distance_outside_polygon() {
        let store = MemorySpatialStore::new(sample_districts(), vec![]);
        // ~0.0003 degrees south of the southern edge is roughly 33 m.
        let point = Point::new(DISTRICT_SOUTH_LAT - 0.0003, 121.51);
        let (region, distance) = store.nearest_region(&point).await.unwrap().unwrap();
        assert_eq!(region.name, "中正區");
        assert!((distance - 33.4).abs() < 1.0, "distance {}", distance);
    }

    #[tokio::test]
    async fn test_list_sites_without_limit_returns_rest_of_catalog() {
        let sites = (1..=5)
            .rev()
            .map(|id| defibrillator(id, "AED", 25.04, 121.52))
            .collect();
        let store = MemorySpatialStore::new(vec![], sites);

        let all = store
            .list_sites(SiteCategory::Defibrillator, None, 0)
            .await
            .unwrap();
        let ids: Vec<i32> = all.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let tail = store
            .list_sites(SiteCategory::Defibrillator, None, 3)
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);

        let page = store
            .list_sites(SiteCategory::Defibrillator, Some(2), 1)
            .await
            .unwrap();
        assert_eq!(page.iter().map(|s| s.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_insert_or_get_keeps_first_row() {
        let store = MemoryMeasurementStore::new();
        let slot = SlotGrid::default().slot_for(Utc.with_ymd_and_hms(2025, 7, 1, 3, 5, 0).unwrap());

        let first = store
            .insert_or_get(new_measurement(slot, 24.9, 121.7))
            .await
            .unwrap();
        let mut second = new_measurement(slot, 24.9, 121.7);
        second.pm25_ugm3 = 99.0;
        let second = store.insert_or_get(second).await.unwrap();

        assert!(first.was_inserted());
        assert!(!second.was_inserted());
        assert_eq!(second.into_record().pm25_ugm3, 10.0);
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn test_latest_before_ignores_current_and_later_slots() {
        let store = MemoryMeasurementStore::new();
        let grid = SlotGrid::default();
        let bucket = SpaceBucket::from_point(&Point::new(25.04, 121.56), 3);
        let early = grid.slot_for(Utc.with_ymd_and_hms(2025, 7, 1, 1, 0, 0).unwrap());
        let mid = grid.slot_for(Utc.with_ymd_and_hms(2025, 7, 1, 2, 0, 0).unwrap());
        let now = grid.slot_for(Utc.with_ymd_and_hms(2025, 7, 1, 3, 0, 0).unwrap());

        store.seed(new_measurement(early, 24.9, 121.7), bucket);
        let expected = store.seed(new_measurement(mid, 24.9, 121.7), bucket);
        store.seed(new_measurement(now, 24.9, 121.7), bucket);

        let latest = store.latest_before(&bucket, &now).await.unwrap().unwrap();
        assert_eq!(latest.id, expected.id);
    }
}
