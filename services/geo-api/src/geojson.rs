//! RFC 7946 GeoJSON for site listings.

use serde::Serialize;
use serde_json::{Map, Value};

use geo_common::{Site, SiteMatch};

pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i32,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection",
            features,
        }
    }

    pub fn from_sites(sites: &[Site]) -> Self {
        Self::new(sites.iter().map(|s| Feature::from_site(s, None)).collect())
    }

    pub fn from_matches(matches: &[SiteMatch]) -> Self {
        Self::new(
            matches
                .iter()
                .map(|m| Feature::from_site(&m.site, Some(m.distance_m)))
                .collect(),
        )
    }
}

impl Feature {
    /// Properties carry the id, name, coordinates and every catalog field,
    /// plus `distance_m` for proximity results.
    pub fn from_site(site: &Site, distance_m: Option<f64>) -> Self {
        let mut properties = Map::new();
        properties.insert("id".into(), site.id.into());
        properties.insert("name".into(), site.name.clone().into());
        properties.insert("lat".into(), site.location.lat.into());
        properties.insert("lon".into(), site.location.lon.into());

        if let Ok(Value::Object(details)) = serde_json::to_value(&site.details) {
            properties.extend(details);
        }
        if let Some(distance) = distance_m {
            properties.insert("distance_m".into(), distance.into());
        }

        Self {
            kind: "Feature",
            id: site.id,
            geometry: Geometry {
                kind: "Point",
                coordinates: [site.location.lon, site.location.lat],
            },
            properties,
        }
    }
}
