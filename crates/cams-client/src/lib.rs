//! Client for CAMS global atmospheric composition forecasts.
//!
//! Requests go through the Atmosphere Data Store retrieve API: submit a job,
//! poll it until it finishes, download the result asset, and decode it as
//! GRIB. All forecast steps of the run are averaged per grid point.

mod client;
mod config;
mod decode;
mod request;

pub use client::CamsClient;
pub use config::{CamsConfig, DEFAULT_API_URL};
pub use decode::{decode_grib, mean_over_messages};
pub use request::{CamsRequest, DATASET, LEAD_HOURS, PM25_VARIABLE};
