//! Health-weather datasets and their per-township payload.
//!
//! Both datasets share one envelope:
//! `records.Locations[].Location[].Time[]`, keyed by county name and then
//! township name. Each time block carries the dataset's own fields under
//! `WeatherElements`.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use geo_common::time::taipei_offset;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Payload {
    #[serde(default)]
    records: Records,
}

#[derive(Debug, Default, Deserialize)]
struct Records {
    #[serde(rename = "Locations", default)]
    locations: Vec<CountyBlock>,
}

#[derive(Debug, Deserialize)]
struct CountyBlock {
    #[serde(rename = "CountyName", default)]
    county_name: String,
    #[serde(rename = "Location", default)]
    towns: Vec<TownBlock>,
}

#[derive(Debug, Deserialize)]
struct TownBlock {
    #[serde(rename = "TownName", default)]
    town_name: String,
    #[serde(rename = "Time", default)]
    times: Vec<TimeBlock>,
}

/// One issued forecast for a township.
#[derive(Debug, Default, Deserialize)]
pub struct TimeBlock {
    #[serde(rename = "IssueTime")]
    pub issue_time: Option<String>,
    #[serde(rename = "StartTime")]
    pub start_time: Option<String>,
    #[serde(rename = "EndTime")]
    pub end_time: Option<String>,
    #[serde(rename = "WeatherElements", default)]
    pub elements: HashMap<String, Value>,
}

impl TimeBlock {
    fn element(&self, name: &str) -> Option<Value> {
        self.elements.get(name).filter(|v| !v.is_null()).cloned()
    }

    fn element_text(&self, name: &str) -> String {
        match self.elements.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// A CWA dataset that can be narrowed to one township.
pub trait ForecastDataset {
    /// Open-data dataset id, e.g. `M-A0085-001`.
    const DATASET_ID: &'static str;

    /// Whether the request needs an explicit `format=JSON`.
    const EXPLICIT_JSON: bool = false;

    type Entry: Serialize + Send;

    fn entry(block: &TimeBlock) -> Self::Entry;

    /// Raw issue time the entries are ordered by.
    fn issue_time(entry: &Self::Entry) -> Option<&str>;

    /// Parse an issue time into an instant. Unparseable times sort last.
    fn parse_issue_time(raw: &str) -> Option<DateTime<FixedOffset>> {
        parse_local_time(raw)
    }
}

/// Heat-injury index (`M-A0085-001`).
pub struct HeatInjury;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatInjuryEntry {
    pub issue_time: Option<String>,
    pub heat_injury_index: Option<Value>,
    pub heat_injury_warning: String,
}

impl ForecastDataset for HeatInjury {
    const DATASET_ID: &'static str = "M-A0085-001";

    type Entry = HeatInjuryEntry;

    fn entry(block: &TimeBlock) -> HeatInjuryEntry {
        HeatInjuryEntry {
            issue_time: block.issue_time.clone(),
            heat_injury_index: block.element("HeatInjuryIndex"),
            heat_injury_warning: block.element_text("HeatInjuryWarning"),
        }
    }

    fn issue_time(entry: &HeatInjuryEntry) -> Option<&str> {
        entry.issue_time.as_deref()
    }
}

/// Temperature-difference reminder index (`F-A0085-005`).
pub struct TemperatureDifference;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureDifferenceEntry {
    pub issue_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub temperature_difference_index: Option<Value>,
    pub temperature_difference_warning: String,
}

impl ForecastDataset for TemperatureDifference {
    const DATASET_ID: &'static str = "F-A0085-005";
    const EXPLICIT_JSON: bool = true;

    type Entry = TemperatureDifferenceEntry;

    fn entry(block: &TimeBlock) -> TemperatureDifferenceEntry {
        TemperatureDifferenceEntry {
            issue_time: block.issue_time.clone(),
            start_time: block.start_time.clone(),
            end_time: block.end_time.clone(),
            temperature_difference_index: block.element("TemperatureDifferenceIndex"),
            temperature_difference_warning: block.element_text("TemperatureDifferenceWarning"),
        }
    }

    fn issue_time(entry: &TemperatureDifferenceEntry) -> Option<&str> {
        entry.issue_time.as_deref()
    }

    // This dataset publishes ISO 8601 with an offset.
    fn parse_issue_time(raw: &str) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .or_else(|| parse_local_time(raw))
    }
}

fn parse_local_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LOCAL_TIME_FORMAT).ok()?;
    taipei_offset().from_local_datetime(&naive).single()
}

/// Forecasts for one district, oldest issue first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictForecast<E> {
    pub city: String,
    pub district: String,
    pub forecasts: Vec<E>,
}

impl Payload {
    /// Entries for `town` within `county`, or `None` when the payload has no
    /// such township.
    pub(crate) fn district<D: ForecastDataset>(
        &self,
        county: &str,
        town: &str,
    ) -> Option<DistrictForecast<D::Entry>> {
        let town = town.trim();
        let block = self
            .records
            .locations
            .iter()
            .filter(|c| c.county_name.trim() == county)
            .flat_map(|c| c.towns.iter())
            .find(|t| t.town_name.trim() == town)?;

        let mut forecasts: Vec<D::Entry> = block.times.iter().map(D::entry).collect();
        forecasts.sort_by_cached_key(|entry| {
            let parsed = D::issue_time(entry).and_then(D::parse_issue_time);
            (parsed.is_none(), parsed)
        });

        Some(DistrictForecast {
            city: county.to_string(),
            district: town.to_string(),
            forecasts,
        })
    }
}
