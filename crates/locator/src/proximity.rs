//! Nearest sites of a category: bounded radius first, then KNN.

use geo_common::{GeoError, GeoResult, Point, SiteCategory, SiteMatch, SpatialStore};
use metrics::counter;
use tracing::{debug, instrument};

/// Search radius when the caller gives none, in meters.
pub const DEFAULT_RADIUS_M: f64 = 1000.0;
pub const DEFAULT_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 100;

/// A validated nearest-site query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteQuery {
    pub category: SiteCategory,
    pub point: Point,
    pub radius_m: f64,
    pub limit: usize,
}

impl SiteQuery {
    /// Query for the single nearest site within the default radius.
    pub fn nearest(category: SiteCategory, point: Point) -> Self {
        Self {
            category,
            point,
            radius_m: DEFAULT_RADIUS_M,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> GeoResult<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(GeoError::invalid("r", "radius must be a positive number of meters"));
        }
        self.radius_m = radius_m;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> GeoResult<Self> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(GeoError::invalid(
                "limit",
                format!("must be 1-{}", MAX_LIMIT),
            ));
        }
        self.limit = limit;
        Ok(self)
    }
}

/// Strategy that produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityTier {
    Radius,
    Knn,
}

impl ProximityTier {
    pub const CHAIN: [ProximityTier; 2] = [ProximityTier::Radius, ProximityTier::Knn];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProximityTier::Radius => "radius",
            ProximityTier::Knn => "knn",
        }
    }

    async fn attempt<S>(&self, store: &S, query: &SiteQuery) -> GeoResult<Vec<SiteMatch>>
    where
        S: SpatialStore + ?Sized,
    {
        match self {
            ProximityTier::Radius => {
                store
                    .sites_within(query.category, &query.point, query.radius_m, query.limit)
                    .await
            }
            ProximityTier::Knn => {
                store
                    .nearest_sites(query.category, &query.point, query.limit)
                    .await
            }
        }
    }
}

/// Outcome of a search. `tier` is `None` when the category is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSearch {
    pub matches: Vec<SiteMatch>,
    pub tier: Option<ProximityTier>,
}

#[derive(Debug, Clone, Default)]
pub struct ProximitySearch;

impl ProximitySearch {
    pub fn new() -> Self {
        Self
    }

    /// Nearest-first matches for `query`, empty when the catalog is empty.
    pub async fn nearest<S>(&self, store: &S, query: SiteQuery) -> GeoResult<Vec<SiteMatch>>
    where
        S: SpatialStore + ?Sized,
    {
        Ok(self.search(store, query).await?.matches)
    }

    #[instrument(skip(self, store), fields(category = %query.category))]
    pub async fn search<S>(&self, store: &S, query: SiteQuery) -> GeoResult<SiteSearch>
    where
        S: SpatialStore + ?Sized,
    {
        for tier in ProximityTier::CHAIN {
            let mut matches = tier.attempt(store, &query).await?;
            if matches.is_empty() {
                continue;
            }

            // KNN order comes from the index metric; report and sort by true distance.
            matches.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
            counter!("proximity_searches_total", "tier" => tier.as_str()).increment(1);
            debug!(tier = tier.as_str(), count = matches.len(), "Found sites");

            return Ok(SiteSearch {
                matches,
                tier: Some(tier),
            });
        }

        counter!("proximity_searches_total", "tier" => "empty").increment(1);
        Ok(SiteSearch {
            matches: Vec::new(),
            tier: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::SiteCategory::{CoolingShelter, Defibrillator};
    use test_utils::{sample_cooling_shelters, sample_defibrillators, MemorySpatialStore};

    fn store() -> MemorySpatialStore {
        let mut sites = sample_cooling_shelters();
        sites.extend(sample_defibrillators());
        MemorySpatialStore::new(vec![], sites)
    }

    // Between Huashan and Daan Park.
    const QUERY: Point = Point { lat: 25.0380, lon: 121.5320 };

    #[tokio::test]
    async fn test_radius_results_within_and_sorted() {
        let store = store();
        let query = SiteQuery::nearest(CoolingShelter, QUERY)
            .with_radius(2_000.0)
            .unwrap()
            .with_limit(10)
            .unwrap();

        let search = ProximitySearch::new().search(&store, query).await.unwrap();

        assert_eq!(search.tier, Some(ProximityTier::Radius));
        assert!(!search.matches.is_empty());
        for m in &search.matches {
            assert!(m.distance_m <= 2_000.0);
            assert_eq!(m.site.category(), CoolingShelter);
        }
        assert!(search
            .matches
            .windows(2)
            .all(|w| w[0].distance_m <= w[1].distance_m));
        assert_eq!(store.knn_queries(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_knn_when_radius_empty() {
        let store = store();
        let query = SiteQuery::nearest(Defibrillator, QUERY)
            .with_radius(50.0)
            .unwrap();

        let search = ProximitySearch::new().search(&store, query).await.unwrap();

        assert_eq!(search.tier, Some(ProximityTier::Knn));
        assert_eq!(store.knn_queries(), 1);
        let hit = &search.matches[0];
        assert_eq!(hit.distance_m, QUERY.distance_to(&hit.site.location));
        assert!(hit.distance_m > 50.0);
    }

    #[tokio::test]
    async fn test_empty_category_is_empty_not_error() {
        let store = MemorySpatialStore::new(vec![], sample_cooling_shelters());
        let query = SiteQuery::nearest(Defibrillator, QUERY);
        let search = ProximitySearch::new().search(&store, query).await.unwrap();
        assert!(search.matches.is_empty());
        assert_eq!(search.tier, None);
    }

    #[test]
    fn test_query_validation() {
        let q = SiteQuery::nearest(CoolingShelter, QUERY);
        assert!(q.with_limit(0).is_err());
        assert!(q.with_limit(101).is_err());
        assert!(q.with_limit(100).is_ok());
        assert!(q.with_radius(0.0).is_err());
        assert!(q.with_radius(f64::NAN).is_err());
    }
}
