//! Point lookups for the city-safety services.
//!
//! Three lookups share one shape: resolve a query through an ordered chain
//! of strategies against a caller-supplied store, stopping at the first one
//! that produces an answer.
//!
//! - [`RegionResolver`]: point to district (containment, then 50 m
//!   tolerance, then nearest)
//! - [`ProximitySearch`]: nearest sites of a category (radius, then KNN)
//! - [`MeasurementCache`]: PM2.5/AQI per (time slot, space bucket), backed
//!   by an upstream fetcher and deduplicated per upstream grid point
//!
//! None of these hold a connection. Every operation takes the store it should
//! run against, so the caller decides pooling and transaction scope.

pub mod aqi;
pub mod cache;
pub mod proximity;
pub mod region;

pub use aqi::{pm25_to_aqi, AqiReading};
pub use cache::{CacheSettings, Measurement, MeasurementCache, MeasurementSource};
pub use proximity::{ProximitySearch, ProximityTier, SiteQuery, SiteSearch};
pub use region::{RegionResolver, RegionTier};
