//! Cooling shelter and AED listings and nearest-site lookups.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use geo_common::{GeoError, GeoResult, SiteCategory};
use locator::proximity::MAX_LIMIT;
use locator::SiteQuery;

use crate::error::{geo_error_response, json_with_type};
use crate::geojson::{FeatureCollection, GEOJSON_CONTENT_TYPE};
use crate::handlers::no_data;
use crate::params::{parse_or, PageParams, PointParams};
use crate::state::AppState;

const SHELTER_PAGE_DEFAULT: usize = 600;
const SHELTER_PAGE_MAX: usize = 1000;
const AED_PAGE_MAX: usize = 5000;

#[derive(Debug, Default, Deserialize)]
pub struct NearestParams {
    #[serde(flatten)]
    pub point: PointParams,
    /// Search radius in meters.
    pub r: Option<String>,
    pub limit: Option<String>,
}

impl NearestParams {
    pub fn query(&self, category: SiteCategory, default_radius_m: f64) -> GeoResult<SiteQuery> {
        const RADIUS_MESSAGE: &str = "invalid r (radius meters)";
        const LIMIT_MESSAGE: &str = "invalid limit (must be 1-100)";

        let point = self.point.point()?;
        let radius: f64 = parse_or(self.r.as_deref(), default_radius_m, "r", RADIUS_MESSAGE)?;
        let limit: i64 = parse_or(self.limit.as_deref(), 1, "limit", LIMIT_MESSAGE)?;
        if limit < 1 || limit as usize > MAX_LIMIT {
            return Err(GeoError::invalid("limit", LIMIT_MESSAGE));
        }

        SiteQuery::nearest(category, point)
            .with_radius(radius)
            .map_err(|_| GeoError::invalid("r", RADIUS_MESSAGE))?
            .with_limit(limit as usize)
    }
}

async fn list(
    state: &AppState,
    category: SiteCategory,
    page: &PageParams,
    default_limit: Option<usize>,
    max_limit: usize,
) -> Response {
    let (limit, offset) = match page.page(default_limit, max_limit) {
        Ok(page) => page,
        Err(e) => return geo_error_response(&e),
    };

    match state.spatial.list_sites(category, limit, offset).await {
        Ok(sites) => json_with_type(
            StatusCode::OK,
            GEOJSON_CONTENT_TYPE,
            &FeatureCollection::from_sites(&sites),
        ),
        Err(e) => geo_error_response(&e),
    }
}

async fn nearest(
    state: &AppState,
    category: SiteCategory,
    params: &NearestParams,
) -> GeoResult<FeatureCollection> {
    let query = params.query(category, state.config.default_radius_m)?;
    let matches = state.search.nearest(state.spatial.as_ref(), query).await?;
    Ok(FeatureCollection::from_matches(&matches))
}

/// GET /sites?limit&offset
pub async fn list_sites_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> Response {
    list(
        &state,
        SiteCategory::CoolingShelter,
        &page,
        Some(SHELTER_PAGE_DEFAULT),
        SHELTER_PAGE_MAX,
    )
    .await
}

/// GET /sites/nearest?lat&lon&r&limit
///
/// An empty catalog yields an empty FeatureCollection.
pub async fn nearest_site_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> Response {
    match nearest(&state, SiteCategory::CoolingShelter, &params).await {
        Ok(collection) => json_with_type(StatusCode::OK, GEOJSON_CONTENT_TYPE, &collection),
        Err(e) => geo_error_response(&e),
    }
}

/// GET /aeds?limit&offset
///
/// Without `limit` the whole catalog is returned.
pub async fn list_aeds_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> Response {
    list(
        &state,
        SiteCategory::Defibrillator,
        &page,
        None,
        AED_PAGE_MAX,
    )
    .await
}

/// GET /aeds/nearest?lat&lon&limit&r
///
/// An empty catalog yields `{"note": "no data"}`.
pub async fn nearest_aed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> Response {
    match nearest(&state, SiteCategory::Defibrillator, &params).await {
        Ok(collection) if collection.features.is_empty() => no_data(),
        Ok(collection) => json_with_type(StatusCode::OK, GEOJSON_CONTENT_TYPE, &collection),
        Err(e) => geo_error_response(&e),
    }
}
