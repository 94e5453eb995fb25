//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

use crate::Point;

/// A geographic bounding box in degrees.
///
/// Upstream atmospheric APIs express areas as `[north, west, south, east]`;
/// [`BoundingBox::to_nwse`] and [`BoundingBox::from_nwse_string`] convert
/// to and from that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Default area for the Taipei deployment.
    pub fn taipei() -> Self {
        Self::new(121.3, 24.9, 121.7, 25.3)
    }

    /// Parse a "north,west,south,east" string.
    pub fn from_nwse_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }
        let [north, west, south, east] = values;

        if south > north || west > east {
            return Err(BboxParseError::Inverted(s.to_string()));
        }

        Ok(Self::new(west, south, east, north))
    }

    /// Area in the `[north, west, south, east]` order used by CAMS requests.
    pub fn to_nwse(&self) -> [f64; 4] {
        [self.max_lat, self.min_lon, self.min_lat, self.max_lon]
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, point: &Point) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid area format: {0}. Expected 'north,west,south,east'")]
    InvalidFormat(String),

    #[error("Invalid number in area: {0}")]
    InvalidNumber(String),

    #[error("Area is inverted: {0}")]
    Inverted(String),
}
