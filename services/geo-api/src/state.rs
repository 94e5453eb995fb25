//! Application state for the city-safety API.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

use cams_client::{CamsClient, CamsConfig};
use cwa_client::CwaClient;
use geo_common::{MeasurementStore, SpatialStore};
use locator::{MeasurementCache, ProximitySearch, RegionResolver};
use push::{
    AccessTokenProvider, CachedTokenProvider, FcmClient, MetadataServerTokenSource,
    StaticTokenSource,
};
use storage::{Database, DeviceRegistry};

use crate::config::ServiceConfig;

/// Upstream credentials and endpoints, usually from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub ads_api_url: Option<String>,
    pub ads_api_key: Option<String>,
    pub cwa_api_key: Option<String>,
    pub fcm_project_id: Option<String>,
    /// Fixed bearer token; the metadata server is used when absent.
    pub fcm_access_token: Option<String>,
    pub internal_api_key: Option<String>,
}

/// Shared application state.
pub struct AppState {
    pub database: Database,
    pub spatial: Arc<dyn SpatialStore>,
    pub measurements: Arc<dyn MeasurementStore>,
    pub devices: DeviceRegistry,

    pub resolver: RegionResolver,
    pub search: ProximitySearch,
    pub cache: MeasurementCache,

    pub cwa: CwaClient,
    /// `None` when `FCM_PROJECT_ID` is not configured.
    pub fcm: Option<FcmClient>,
    /// `/internal/notify` is unauthenticated when `None`.
    pub internal_api_key: Option<String>,

    pub config: ServiceConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the production stores and clients around `database`.
    pub fn new(
        database: Database,
        config: ServiceConfig,
        credentials: Credentials,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        let mut cams_config = CamsConfig::new(
            credentials
                .ads_api_url
                .unwrap_or_else(|| cams_client::DEFAULT_API_URL.to_string()),
            credentials.ads_api_key.unwrap_or_default(),
        );
        // An attempt is bounded by the cache; the job wait must fit inside it.
        cams_config.max_wait = cams_config.max_wait.min(config.cache_settings().attempt_timeout);
        if cams_config.api_key.is_empty() {
            warn!("ADS_API_KEY not set, AQI lookups will fail upstream");
        }
        let cams = CamsClient::new(cams_config).context("Failed to create CAMS client")?;

        let cwa = CwaClient::new(credentials.cwa_api_key).context("Failed to create CWA client")?;

        let fcm = match credentials.fcm_project_id.filter(|p| !p.trim().is_empty()) {
            Some(project_id) => {
                let tokens: Arc<dyn AccessTokenProvider> = match credentials.fcm_access_token {
                    Some(token) => Arc::new(StaticTokenSource::new(token)),
                    None => Arc::new(CachedTokenProvider::new(
                        MetadataServerTokenSource::new()
                            .context("Failed to create metadata token source")?,
                    )),
                };
                info!(project_id = %project_id, "FCM push enabled");
                Some(FcmClient::new(&project_id, tokens).context("Failed to create FCM client")?)
            }
            None => {
                warn!("FCM_PROJECT_ID not set, /internal/notify is disabled");
                None
            }
        };

        Ok(Self {
            spatial: Arc::new(database.spatial()),
            measurements: Arc::new(database.measurements()),
            devices: database.devices(),
            database,
            resolver: RegionResolver::new(config.region_tolerance_m),
            search: ProximitySearch::new(),
            cache: MeasurementCache::new(Arc::new(cams), config.cache_settings()),
            cwa,
            fcm,
            internal_api_key: credentials
                .internal_api_key
                .filter(|k| !k.is_empty()),
            config,
            metrics,
        })
    }
}
