//! Central Weather Administration open-data client.
//!
//! Two health-weather datasets are published per township: the heat-injury
//! index (`M-A0085-001`) and the temperature-difference reminder index
//! (`F-A0085-005`). Both are looked up by district name, which callers
//! usually obtain by resolving a point with [`locator::RegionResolver`].

mod client;
mod dataset;
mod error;

pub use client::{CwaClient, DEFAULT_BASE_URL};
pub use dataset::{
    DistrictForecast, ForecastDataset, HeatInjury, HeatInjuryEntry, TemperatureDifference,
    TemperatureDifferenceEntry,
};
pub use error::{CwaError, CwaResult};
