//! Heat-injury and temperature-difference forecasts for the caller's district.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Response},
    Json,
};

use cwa_client::{ForecastDataset, HeatInjury, TemperatureDifference};

use crate::error::geo_error_response;
use crate::handlers::no_data;
use crate::params::PointParams;
use crate::state::AppState;

async fn district_forecast<D: ForecastDataset>(
    state: &AppState,
    params: &PointParams,
) -> Response {
    let point = match params.point() {
        Ok(point) => point,
        Err(e) => return geo_error_response(&e),
    };

    match state
        .cwa
        .forecast_by_point::<D, _>(&state.resolver, state.spatial.as_ref(), point)
        .await
    {
        Ok(Some(forecast)) => Json(forecast).into_response(),
        Ok(None) => no_data(),
        Err(e) => geo_error_response(&e),
    }
}

/// GET /heat/forecast?lat&lon
pub async fn heat_forecast_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PointParams>,
) -> Response {
    district_forecast::<HeatInjury>(&state, &params).await
}

/// GET /tempdiff/forecast?lat&lon
pub async fn tempdiff_forecast_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PointParams>,
) -> Response {
    district_forecast::<TemperatureDifference>(&state, &params).await
}
