//! PM2.5 and AQI at a point.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};

use geo_common::Point;
use locator::Measurement;

use crate::error::geo_error_response;
use crate::params::{parse_flag, PointParams};
use crate::state::AppState;

pub const SOURCE_LABEL: &str = "CAMS global atmospheric composition forecasts";


#[derive(Debug, Default, Deserialize)]
pub struct AqiParams {
    #[serde(flatten)]
    pub point: PointParams,
    /// Skip the stale fallback and refresh from upstream.
    pub force: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketBody {
    pub lat: f64,
    pub lon: f64,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiResponse {
    pub input: Point,
    pub pm25_ugm3: f64,
    pub aqi: i32,
    pub category: String,
    pub cams_reference_time: String,
    pub generated_at_utc: String,
    pub generated_at_taipei: String,
    pub slot_utc: String,
    pub slot_taipei: String,
    pub stale: bool,
    pub cache: &'static str,
    pub bucket: BucketBody,
    pub grid_point: Point,
    pub source: &'static str,
}

/// ISO-8601 to the second with a numeric offset, `+00:00` for UTC.
fn iso_seconds<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Two decimals, halves away from zero.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl AqiResponse {
    pub fn new(input: Point, measurement: &Measurement) -> Self {
        let record = &measurement.record;
        let offset = *measurement.slot_local().offset();

        Self {
            input,
            pm25_ugm3: round2(record.pm25_ugm3),
            aqi: record.aqi,
            category: record.category.label().to_string(),
            cams_reference_time: record.reference.clone(),
            generated_at_utc: iso_seconds(&record.fetched_at),
            generated_at_taipei: iso_seconds(&record.fetched_at.with_timezone(&offset)),
            slot_utc: measurement.slot_utc().to_rfc3339(),
            slot_taipei: measurement.slot_local().to_rfc3339(),
            stale: measurement.is_stale(),
            cache: measurement.source.as_str(),
            bucket: BucketBody {
                lat: measurement.bucket.lat(),
                lon: measurement.bucket.lon(),
                decimals: measurement.bucket.decimals,
            },
            grid_point: Point::new(record.grid_point.lat, record.grid_point.lon),
            source: SOURCE_LABEL,
        }
    }
}

/// GET /aqi/pm25?lat&lon&force
pub async fn pm25_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AqiParams>,
) -> Response {
    let point = match params.point.point() {
        Ok(point) => point,
        Err(e) => return geo_error_response(&e),
    };
    let force = parse_flag(params.force.as_deref());

    match state
        .cache
        .get(state.measurements.as_ref(), point, force)
        .await
    {
        Ok(measurement) => Json(AqiResponse::new(point, &measurement)).into_response(),
        Err(e) => geo_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_generated_at_is_iso_with_offset() {
        let fetched = Utc.with_ymd_and_hms(2025, 7, 1, 3, 21, 4).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(iso_seconds(&fetched), "2025-07-01T03:21:04+00:00");

        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            iso_seconds(&fetched.with_timezone(&taipei)),
            "2025-07-01T11:21:04+08:00"
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(18.254), 18.25);
        assert_eq!(round2(18.255_000_1), 18.26);
        assert_eq!(round2(0.0), 0.0);
    }
}
