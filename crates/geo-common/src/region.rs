//! Administrative regions and the result of resolving a point to one.

use serde::{Deserialize, Serialize};

/// Parent city of every region in the default deployment.
pub const DEFAULT_CITY: &str = "臺北市";

/// An administrative district polygon, as far as callers need to know it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i32,
    pub name: String,
    pub city: String,
}

/// Which tier of the fallback chain produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolveMethod {
    /// The point lies inside the region polygon.
    #[serde(rename = "contains")]
    Contains,
    /// Closest region within the boundary tolerance.
    #[serde(rename = "nearest<50m")]
    NearWithin,
    /// Globally nearest region by index order.
    #[serde(rename = "knn")]
    Knn,
}

impl ResolveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMethod::Contains => "contains",
            ResolveMethod::NearWithin => "nearest<50m",
            ResolveMethod::Knn => "knn",
        }
    }
}

impl std::fmt::Display for ResolveMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRegion {
    pub region: Region,
    pub method: ResolveMethod,
    /// Surface distance from the query point to the region, zero on containment.
    pub distance_m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serializes_to_tier_label() {
        assert_eq!(
            serde_json::to_string(&ResolveMethod::NearWithin).unwrap(),
            "\"nearest<50m\""
        );
        assert_eq!(ResolveMethod::Knn.to_string(), "knn");
    }
}
