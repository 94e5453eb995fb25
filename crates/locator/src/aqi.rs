//! PM2.5 concentration to US EPA AQI.

use geo_common::AqiCategory;
use serde::Serialize;

/// One row of the breakpoint table: concentration range (µg m-3) mapped
/// linearly onto an index range.
struct Breakpoint {
    c_low: f64,
    c_high: f64,
    i_low: f64,
    i_high: f64,
    category: AqiCategory,
}

const BREAKPOINTS: [Breakpoint; 6] = [
    Breakpoint {
        c_low: 0.0,
        c_high: 12.0,
        i_low: 0.0,
        i_high: 50.0,
        category: AqiCategory::Good,
    },
    Breakpoint {
        c_low: 12.1,
        c_high: 35.4,
        i_low: 51.0,
        i_high: 100.0,
        category: AqiCategory::Moderate,
    },
    Breakpoint {
        c_low: 35.5,
        c_high: 55.4,
        i_low: 101.0,
        i_high: 150.0,
        category: AqiCategory::UnhealthyForSensitiveGroups,
    },
    Breakpoint {
        c_low: 55.5,
        c_high: 150.4,
        i_low: 151.0,
        i_high: 200.0,
        category: AqiCategory::Unhealthy,
    },
    Breakpoint {
        c_low: 150.5,
        c_high: 250.4,
        i_low: 201.0,
        i_high: 300.0,
        category: AqiCategory::VeryUnhealthy,
    },
    Breakpoint {
        c_low: 250.5,
        c_high: 500.4,
        i_low: 301.0,
        i_high: 500.0,
        category: AqiCategory::Hazardous,
    },
];

/// Upper end of the table's domain.
pub const MAX_PM25: f64 = 500.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AqiReading {
    pub aqi: i32,
    pub category: AqiCategory,
}

/// Map a PM2.5 concentration in µg m-3 to its AQI and category.
///
/// Input is clamped to `[0, 500.4]`. Values falling between two bands
/// (e.g. 12.05) belong to the upper band.
pub fn pm25_to_aqi(pm25: f64) -> AqiReading {
    let c = if pm25.is_nan() { 0.0 } else { pm25.clamp(0.0, MAX_PM25) };

    let band = BREAKPOINTS
        .iter()
        .find(|b| c <= b.c_high)
        .unwrap_or(&BREAKPOINTS[BREAKPOINTS.len() - 1]);

    let slope = (band.i_high - band.i_low) / (band.c_high - band.c_low);
    let aqi = slope * (c - band.c_low) + band.i_low;

    AqiReading {
        aqi: aqi.round().max(band.i_low) as i32,
        category: band.category,
    }
}
