//! Route-level tests over in-memory stores.
//!
//! The database pool is lazy and never used by these routes, and the CWA
//! client points at a closed port.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::DateTime;
use serde_json::{json, Value};
use tower::ServiceExt;

use cwa_client::CwaClient;
use geo_api::config::ServiceConfig;
use geo_api::routes::router;
use geo_api::state::AppState;
use geo_common::Site;
use locator::{MeasurementCache, ProximitySearch, RegionResolver};
use storage::Database;
use test_utils::{
    defibrillator, sample_cooling_shelters, sample_defibrillators, sample_districts,
    taipei_pm25_grid, MemoryMeasurementStore, MemorySpatialStore, ScriptedFetcher,
};

struct TestApp {
    sites: Vec<Site>,
    fetcher: ScriptedFetcher,
    internal_api_key: Option<String>,
}

impl Default for TestApp {
    fn default() -> Self {
        let mut sites = sample_cooling_shelters();
        sites.extend(sample_defibrillators());
        Self {
            sites,
            fetcher: ScriptedFetcher::returning(taipei_pm25_grid()),
            internal_api_key: None,
        }
    }
}

impl TestApp {
    fn build(self) -> Router {
        let config = ServiceConfig::default();
        let database = Database::connect_lazy("postgresql://localhost:1/unused", 1).unwrap();

        let state = AppState {
            spatial: Arc::new(MemorySpatialStore::new(sample_districts(), self.sites)),
            measurements: Arc::new(MemoryMeasurementStore::new()),
            devices: database.devices(),
            database,
            resolver: RegionResolver::new(config.region_tolerance_m),
            search: ProximitySearch::new(),
            cache: MeasurementCache::new(Arc::new(self.fetcher), config.cache_settings()),
            cwa: CwaClient::with_base_url("http://127.0.0.1:9/api", None).unwrap(),
            fcm: None,
            internal_api_key: self.internal_api_key,
            config,
            metrics: None,
        };
        router(Arc::new(state))
    }
}

fn app() -> Router {
    TestApp::default().build()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(
    app: Router,
    uri: &str,
    body: Value,
    api_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        request = request.header("X-API-Key", key);
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ============================================================================
// Districts
// ============================================================================

#[tokio::test]
async fn test_which_district_contains() {
    let (status, body) = get(app(), "/which-district?lat=25.03&lon=121.545").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], json!("臺北市"));
    assert_eq!(body["district"], json!("大安區"));
    assert_eq!(body["method"], json!("contains"));
}

#[tokio::test]
async fn test_which_district_far_point_uses_knn() {
    let (status, body) = get(app(), "/which-district?lat=25.10&lon=121.51").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["district"], json!("中正區"));
    assert_eq!(body["method"], json!("knn"));
    assert!(body["distance_m"].as_f64().unwrap() > 50.0);
}

#[tokio::test]
async fn test_which_district_requires_coordinates() {
    let (status, body) = get(app(), "/which-district?lat=25.03").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "lat/lon required" }));
}

// ============================================================================
// Sites
// ============================================================================

#[tokio::test]
async fn test_nearest_shelter_feature_collection() {
    let response = app()
        .oneshot(
            Request::get("/sites/nearest?lat=25.0470&lon=121.5175")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/geo+json"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["type"], json!("FeatureCollection"));
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["id"], json!(10));
    assert!(features[0]["properties"]["distance_m"].as_f64().unwrap() < 1000.0);
}

#[tokio::test]
async fn test_site_listing_validates_page() {
    let (status, body) = get(app(), "/sites?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid limit/offset"));

    let (status, body) = get(app(), "/sites?limit=2&offset=1").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = body["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![11, 12]);
}

#[tokio::test]
async fn test_aed_listing_returns_whole_catalog() {
    let aeds: Vec<Site> = (1..=1200)
        .map(|id| {
            let offset = f64::from(id) * 1e-5;
            defibrillator(id, "AED", 25.03 + offset, 121.50 + offset)
        })
        .collect();
    let app = || {
        TestApp {
            sites: aeds.clone(),
            ..Default::default()
        }
        .build()
    };

    let (status, body) = get(app(), "/aeds").await;
    assert_eq!(status, StatusCode::OK);
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 1200);
    assert_eq!(features[0]["id"], json!(1));
    assert_eq!(features[1199]["id"], json!(1200));

    let (status, body) = get(app(), "/aeds?limit=50&offset=1190").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features"].as_array().unwrap().len(), 10);

    let (status, body) = get(app(), "/aeds?offset=1000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features"].as_array().unwrap().len(), 200);

    let (status, _) = get(app(), "/aeds?limit=5001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nearest_aeds_limit_and_order() {
    let (status, body) = get(
        app(),
        "/aeds/nearest?lat=25.0470&lon=121.5175&limit=2&r=50",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["id"], json!(21));
    assert_eq!(features[1]["id"], json!(20));
}

#[tokio::test]
async fn test_nearest_aeds_rejects_limit_over_100() {
    let (status, body) = get(
        app(),
        "/aeds/nearest?lat=25.04&lon=121.52&limit=101",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid limit (must be 1-100)"));
}

#[tokio::test]
async fn test_nearest_aeds_empty_catalog_is_no_data() {
    let app = TestApp {
        sites: sample_cooling_shelters(),
        ..Default::default()
    }
    .build();
    let (status, body) = get(app, "/aeds/nearest?lat=25.04&lon=121.52").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "note": "no data" }));
}

// ============================================================================
// AQI
// ============================================================================

#[tokio::test]
async fn test_pm25_response() {
    let (status, body) = get(app(), "/aqi/pm25?lat=25.0340&lon=121.5645").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"], json!({ "lat": 25.034, "lon": 121.5645 }));
    assert_eq!(body["pm25_ugm3"], json!(160.0));
    assert_eq!(body["category"], json!("Very Unhealthy"));
    assert_eq!(body["cache"], json!("upstream"));
    assert_eq!(body["stale"], json!(false));
    assert_eq!(body["bucket"]["decimals"], json!(3));
    assert_eq!(
        body["source"],
        json!("CAMS global atmospheric composition forecasts")
    );
    assert!(body["cams_reference_time"].as_str().unwrap().ends_with("UTC"));

    let utc = body["generated_at_utc"].as_str().unwrap();
    let taipei = body["generated_at_taipei"].as_str().unwrap();
    assert!(utc.ends_with("+00:00"), "{}", utc);
    assert!(taipei.ends_with("+08:00"), "{}", taipei);
    assert_eq!(
        DateTime::parse_from_rfc3339(utc).unwrap(),
        DateTime::parse_from_rfc3339(taipei).unwrap()
    );
}

#[tokio::test]
async fn test_pm25_upstream_failure_is_502() {
    let app = TestApp {
        fetcher: ScriptedFetcher::failing(),
        ..Default::default()
    }
    .build();
    let (status, body) = get(app, "/aqi/pm25?lat=25.0340&lon=121.5645").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());
}

// ============================================================================
// Forecasts and push
// ============================================================================

#[tokio::test]
async fn test_forecast_without_api_key_is_server_error() {
    let (status, body) = get(app(), "/heat/forecast?lat=25.03&lon=121.545").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
}

#[tokio::test]
async fn test_notify_checks_api_key() {
    let app = || {
        TestApp {
            internal_api_key: Some("secret".into()),
            ..Default::default()
        }
        .build()
    };

    let (status, body) =
        post_json(app(), "/internal/notify", json!({ "topic": "t" }), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("invalid api key"));

    let (status, body) =
        post_json(app(), "/internal/notify", json!({ "title": "hi" }), Some("secret")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("need one of: token | tokens[] | topic | user_id")
    );
}

#[tokio::test]
async fn test_notify_accepts_non_string_data() {
    // The target is read, so the request gets as far as the missing FCM client.
    let (status, body) = post_json(
        app(),
        "/internal/notify",
        json!({ "topic": "alerts", "data": { "level": 3, "urgent": true } }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
}

#[tokio::test]
async fn test_notify_reports_malformed_body() {
    let (status, body) = post_json(
        app(),
        "/internal/notify",
        json!({ "topic": "alerts", "tokens": "not-a-list" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert_ne!(message, "need one of: token | tokens[] | topic | user_id");
    assert!(message.contains("tokens"), "{}", message);
}

#[tokio::test]
async fn test_register_requires_token() {
    let (status, body) = post_json(
        app(),
        "/devices/register",
        json!({ "user_id": "u1" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("fcm_token required"));
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}
