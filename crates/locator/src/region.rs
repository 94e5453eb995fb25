//! Point to administrative district.

use geo_common::{GeoResult, Point, Region, ResolveMethod, ResolvedRegion, SpatialStore};
use metrics::counter;
use tracing::{debug, instrument};

/// Boundary tolerance for the bounded-nearest tier, in meters.
pub const DEFAULT_TOLERANCE_M: f64 = 50.0;

/// One strategy in the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTier {
    /// Exact polygon containment.
    Containment,
    /// Closest polygon within the tolerance distance.
    BoundedNearest,
    /// Closest polygon at any distance.
    Nearest,
}

impl RegionTier {
    pub const CHAIN: [RegionTier; 3] = [
        RegionTier::Containment,
        RegionTier::BoundedNearest,
        RegionTier::Nearest,
    ];

    pub fn method(&self) -> ResolveMethod {
        match self {
            RegionTier::Containment => ResolveMethod::Contains,
            RegionTier::BoundedNearest => ResolveMethod::NearWithin,
            RegionTier::Nearest => ResolveMethod::Knn,
        }
    }

    async fn attempt<S>(
        &self,
        store: &S,
        point: &Point,
        tolerance_m: f64,
    ) -> GeoResult<Option<(Region, f64)>>
    where
        S: SpatialStore + ?Sized,
    {
        match self {
            RegionTier::Containment => Ok(store
                .region_containing(point)
                .await?
                .map(|region| (region, 0.0))),
            RegionTier::BoundedNearest => store.nearest_region_within(point, tolerance_m).await,
            RegionTier::Nearest => store.nearest_region(point).await,
        }
    }
}

/// Resolves points to districts through an ordered tier chain.
///
/// The first tier that yields a region wins; tiers are never blended.
/// Store errors abort the chain and propagate unchanged.
#[derive(Debug, Clone)]
pub struct RegionResolver {
    tiers: Vec<RegionTier>,
    tolerance_m: f64,
}

impl Default for RegionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_M)
    }
}

impl RegionResolver {
    pub fn new(tolerance_m: f64) -> Self {
        Self {
            tiers: RegionTier::CHAIN.to_vec(),
            tolerance_m,
        }
    }

    /// Use a custom tier order, e.g. to exercise one tier in isolation.
    pub fn with_tiers(mut self, tiers: Vec<RegionTier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn tiers(&self) -> &[RegionTier] {
        &self.tiers
    }

    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    /// Resolve `point` to a region. `None` only when no region is stored.
    #[instrument(skip(self, store), fields(lat = point.lat, lon = point.lon))]
    pub async fn resolve<S>(&self, store: &S, point: Point) -> GeoResult<Option<ResolvedRegion>>
    where
        S: SpatialStore + ?Sized,
    {
        for tier in &self.tiers {
            if let Some((region, distance_m)) =
                tier.attempt(store, &point, self.tolerance_m).await?
            {
                let method = tier.method();
                counter!("region_resolutions_total", "method" => method.as_str()).increment(1);
                debug!(region = %region.name, %method, distance_m, "Resolved region");
                return Ok(Some(ResolvedRegion {
                    region,
                    method,
                    distance_m,
                }));
            }
        }

        debug!("No regions stored");
        Ok(None)
    }
}
