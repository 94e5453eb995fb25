//! Retrieve request body.

use geo_common::{BoundingBox, RunReference};
use serde::Serialize;

pub const DATASET: &str = "cams-global-atmospheric-composition-forecasts";
pub const PM25_VARIABLE: &str = "particulate_matter_2.5um";
/// Forecast steps averaged into one value, in hours from the run.
pub const LEAD_HOURS: [u32; 9] = [0, 3, 6, 9, 12, 15, 18, 21, 24];

/// `inputs` of an ADS process execution for one model run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CamsRequest {
    pub variable: Vec<String>,
    pub date: Vec<String>,
    pub time: Vec<String>,
    pub leadtime_hour: Vec<String>,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub data_format: String,
    /// North, west, south, east.
    pub area: [f64; 4],
}

impl CamsRequest {
    pub fn pm25(reference: &RunReference, area: &BoundingBox) -> Self {
        let date = reference.date_string();
        Self {
            variable: vec![PM25_VARIABLE.to_string()],
            date: vec![format!("{}/{}", date, date)],
            time: vec![reference.time_string()],
            leadtime_hour: LEAD_HOURS.iter().map(|h| h.to_string()).collect(),
            kind: vec!["forecast".to_string()],
            data_format: "grib".to_string(),
            area: area.to_nwse(),
        }
    }
}
