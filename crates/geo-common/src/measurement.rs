//! Cached air-quality measurements.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GeoError, GridPointKey, TimeSlot};

/// US EPA health category for a PM2.5 index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AqiCategory {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AqiCategory::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| GeoError::InternalError(format!("Unknown AQI category: {}", s)))
    }
}

/// A measurement about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub slot: TimeSlot,
    pub grid_point: GridPointKey,
    pub pm25_ugm3: f64,
    pub aqi: i32,
    pub category: AqiCategory,
    /// Upstream run used, e.g. "2025-07-01 12:00 UTC".
    pub reference: String,
    pub fetched_at: DateTime<Utc>,
}

/// A persisted measurement row. At most one exists per (slot, grid point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: i64,
    pub slot: TimeSlot,
    pub grid_point: GridPointKey,
    pub pm25_ugm3: f64,
    pub aqi: i32,
    pub category: AqiCategory,
    pub reference: String,
    pub fetched_at: DateTime<Utc>,
}

impl MeasurementRecord {
    pub fn from_new(id: i64, new: NewMeasurement) -> Self {
        Self {
            id,
            slot: new.slot,
            grid_point: new.grid_point,
            pm25_ugm3: new.pm25_ugm3,
            aqi: new.aqi,
            category: new.category,
            reference: new.reference,
            fetched_at: new.fetched_at,
        }
    }
}

/// Result of an insert-or-read-back on the (slot, grid point) key.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(MeasurementRecord),
    /// Another writer got there first; this is the winning row.
    Existing(MeasurementRecord),
}

impl InsertOutcome {
    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }

    pub fn into_record(self) -> MeasurementRecord {
        match self {
            InsertOutcome::Inserted(r) | InsertOutcome::Existing(r) => r,
        }
    }
}
