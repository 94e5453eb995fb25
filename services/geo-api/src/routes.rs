//! Route table.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Districts
        .route(
            "/which-district",
            get(handlers::districts::which_district_handler),
        )
        // Cooling shelters
        .route("/sites", get(handlers::sites::list_sites_handler))
        .route("/sites/nearest", get(handlers::sites::nearest_site_handler))
        // AEDs
        .route("/aeds", get(handlers::sites::list_aeds_handler))
        .route("/aeds/nearest", get(handlers::sites::nearest_aed_handler))
        // Air quality
        .route("/aqi/pm25", get(handlers::aqi::pm25_handler))
        // CWA forecasts
        .route(
            "/heat/forecast",
            get(handlers::forecast::heat_forecast_handler),
        )
        .route(
            "/tempdiff/forecast",
            get(handlers::forecast::tempdiff_forecast_handler),
        )
        // Push
        .route(
            "/devices/register",
            post(handlers::devices::register_device_handler),
        )
        .route("/internal/notify", post(handlers::notify::notify_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
