//! Common types and utilities shared across the city-safety services.
//!
//! Everything the core lookups need to agree on lives here: coordinates,
//! regions and sites, the time-slot and space-bucket keys of the AQI cache,
//! the upstream grid model, and the traits the storage and fetcher crates
//! implement.

pub mod bbox;
pub mod bucket;
pub mod error;
pub mod grid;
pub mod measurement;
pub mod point;
pub mod region;
pub mod site;
pub mod store;
pub mod time;

pub use bbox::BoundingBox;
pub use bucket::SpaceBucket;
pub use error::{FetchError, GeoError, GeoResult};
pub use grid::{GridCell, GridPointKey, GridSample, PollutantGrid};
pub use measurement::{AqiCategory, InsertOutcome, MeasurementRecord, NewMeasurement};
pub use point::Point;
pub use region::{Region, ResolveMethod, ResolvedRegion};
pub use site::{
    CoolingShelterDetails, DefibrillatorDetails, Site, SiteCategory, SiteDetails, SiteMatch,
};
pub use store::{MeasurementStore, SpatialStore, UpstreamFetcher};
pub use time::{RunReference, SlotGrid, TimeSlot};
