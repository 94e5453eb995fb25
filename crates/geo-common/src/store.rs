//! Contracts between the core lookups and their collaborators.
//!
//! Every method is a single round trip against the backing store, so a
//! caller never holds a transaction open while it waits on the network.

use async_trait::async_trait;

use crate::{
    BoundingBox, FetchError, GeoResult, GridPointKey, InsertOutcome, MeasurementRecord,
    NewMeasurement, Point, PollutantGrid, Region, RunReference, Site, SiteCategory, SiteMatch,
    SpaceBucket, TimeSlot,
};

/// Spatial queries over regions and site catalogs.
///
/// Distances are surface distances in meters.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Region whose polygon contains `point`, if any.
    async fn region_containing(&self, point: &Point) -> GeoResult<Option<Region>>;

    /// Closest region within `max_distance_m` of `point`.
    async fn nearest_region_within(
        &self,
        point: &Point,
        max_distance_m: f64,
    ) -> GeoResult<Option<(Region, f64)>>;

    /// Closest region regardless of distance. `None` only if there are no regions.
    async fn nearest_region(&self, point: &Point) -> GeoResult<Option<(Region, f64)>>;

    /// Sites within `radius_m`, ascending by distance, at most `limit`.
    async fn sites_within(
        &self,
        category: SiteCategory,
        point: &Point,
        radius_m: f64,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>>;

    /// Index-ordered nearest sites with their true surface distance.
    async fn nearest_sites(
        &self,
        category: SiteCategory,
        point: &Point,
        limit: usize,
    ) -> GeoResult<Vec<SiteMatch>>;

    /// Page through a catalog in id order. `None` returns every site after `offset`.
    async fn list_sites(
        &self,
        category: SiteCategory,
        limit: Option<usize>,
        offset: usize,
    ) -> GeoResult<Vec<Site>>;
}

/// Persistence for the AQI cache.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Row linked to exactly this (slot, bucket).
    async fn find_by_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
    ) -> GeoResult<Option<MeasurementRecord>>;

    /// Most recent row linked to `bucket` in a slot earlier than `before`.
    async fn latest_before(
        &self,
        bucket: &SpaceBucket,
        before: &TimeSlot,
    ) -> GeoResult<Option<MeasurementRecord>>;

    async fn find_by_grid_point(
        &self,
        slot: &TimeSlot,
        grid_point: &GridPointKey,
    ) -> GeoResult<Option<MeasurementRecord>>;

    /// Insert unless a row for the same (slot, grid point) exists, in which
    /// case the existing row is returned untouched.
    async fn insert_or_get(&self, measurement: NewMeasurement) -> GeoResult<InsertOutcome>;

    /// Point (slot, bucket) at a measurement. A no-op if already linked.
    async fn link_bucket(
        &self,
        slot: &TimeSlot,
        bucket: &SpaceBucket,
        measurement_id: i64,
    ) -> GeoResult<()>;
}

/// Retrieval of a gridded pollutant field for one upstream model run.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch(
        &self,
        reference: &RunReference,
        area: &BoundingBox,
    ) -> Result<PollutantGrid, FetchError>;
}
