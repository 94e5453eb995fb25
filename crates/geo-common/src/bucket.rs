//! Space buckets: coordinates rounded to a fixed decimal precision.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Default bucket precision; three decimals is roughly a 110 m cell.
pub const DEFAULT_BUCKET_DECIMALS: u32 = 3;

/// A point rounded to `decimals` places, stored as scaled integers so that
/// equality is exact in memory and in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceBucket {
    pub lat_key: i32,
    pub lon_key: i32,
    pub decimals: u32,
}

impl SpaceBucket {
    pub fn from_point(point: &Point, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            lat_key: (point.lat * scale).round() as i32,
            lon_key: (point.lon * scale).round() as i32,
            decimals,
        }
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }

    pub fn lat(&self) -> f64 {
        self.lat_key as f64 / self.scale()
    }

    pub fn lon(&self) -> f64 {
        self.lon_key as f64 / self.scale()
    }

    pub fn center(&self) -> Point {
        Point::new(self.lat(), self.lon())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_three_decimals() {
        let bucket = SpaceBucket::from_point(&Point::new(25.03361, 121.56452), 3);
        assert_eq!(bucket.lat_key, 25034);
        assert_eq!(bucket.lon_key, 121565);
        assert!((bucket.lat() - 25.034).abs() < 1e-9);
        assert!((bucket.lon() - 121.565).abs() < 1e-9);
    }

    #[test]
    fn test_nearby_points_share_bucket() {
        let a = SpaceBucket::from_point(&Point::new(25.0331, 121.5649), 3);
        let b = SpaceBucket::from_point(&Point::new(25.0334, 121.5651), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_coordinates() {
        let bucket = SpaceBucket::from_point(&Point::new(-33.8688, -151.2093), 3);
        assert_eq!(bucket.lat_key, -33869);
        assert_eq!(bucket.lon_key, -151209);
    }
}
