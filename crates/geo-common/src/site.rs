//! Points of interest served by the proximity search.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Catalog a site belongs to. Each category lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteCategory {
    CoolingShelter,
    Defibrillator,
}

impl SiteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteCategory::CoolingShelter => "cooling_shelter",
            SiteCategory::Defibrillator => "defibrillator",
        }
    }
}

impl std::fmt::Display for SiteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of a public cooling shelter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoolingShelterDetails {
    /// Indoor or outdoor.
    pub location_type: Option<String>,
    pub district_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub ext: Option<String>,
    pub mobile: Option<String>,
    pub other_contact: Option<String>,
    pub open_hours: Option<String>,
    pub fan: Option<bool>,
    pub ac: Option<bool>,
    pub toilet: Option<bool>,
    pub seating: Option<bool>,
    pub drinking: Option<bool>,
    pub accessible_seat: Option<bool>,
    pub features: Option<String>,
    pub notes: Option<String>,
}

/// Attributes of a defibrillator (AED) placement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefibrillatorDetails {
    pub address: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub place: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteDetails {
    CoolingShelter(CoolingShelterDetails),
    Defibrillator(DefibrillatorDetails),
}

impl SiteDetails {
    pub fn category(&self) -> SiteCategory {
        match self {
            SiteDetails::CoolingShelter(_) => SiteCategory::CoolingShelter,
            SiteDetails::Defibrillator(_) => SiteCategory::Defibrillator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: i32,
    pub name: Option<String>,
    pub location: Point,
    pub details: SiteDetails,
}

impl Site {
    pub fn category(&self) -> SiteCategory {
        self.details.category()
    }
}

/// A site together with its surface distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMatch {
    pub site: Site,
    pub distance_m: f64,
}
