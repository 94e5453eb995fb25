//! Point to district.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use geo_common::region::DEFAULT_CITY;
use geo_common::ResolvedRegion;

use crate::error::geo_error_response;
use crate::params::PointParams;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DistrictResponse {
    pub city: String,
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<Option<ResolvedRegion>> for DistrictResponse {
    fn from(resolved: Option<ResolvedRegion>) -> Self {
        match resolved {
            Some(resolved) => Self {
                city: resolved.region.city,
                district: Some(resolved.region.name),
                method: Some(resolved.method.as_str().to_string()),
                distance_m: Some(resolved.distance_m),
                note: None,
            },
            None => Self {
                city: DEFAULT_CITY.to_string(),
                district: None,
                method: None,
                distance_m: None,
                note: Some("not in polygon / too far".to_string()),
            },
        }
    }
}

/// GET /which-district?lat&lon
pub async fn which_district_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PointParams>,
) -> Response {
    let point = match params.point() {
        Ok(point) => point,
        Err(e) => return geo_error_response(&e),
    };

    match state.resolver.resolve(state.spatial.as_ref(), point).await {
        Ok(resolved) => Json(DistrictResponse::from(resolved)).into_response(),
        Err(e) => geo_error_response(&e),
    }
}
