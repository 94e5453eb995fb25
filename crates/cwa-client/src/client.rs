//! HTTP client for the CWA open-data datastore.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument, warn};

use geo_common::region::DEFAULT_CITY;
use geo_common::{GeoResult, Point, SpatialStore};
use locator::RegionResolver;

use crate::dataset::{DistrictForecast, ForecastDataset, Payload};
use crate::error::{CwaError, CwaResult};

pub const DEFAULT_BASE_URL: &str = "https://opendata.cwa.gov.tw/api/v1/rest/datastore";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the township health-weather datasets of one county.
#[derive(Clone)]
pub struct CwaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    county: String,
}

impl CwaClient {
    pub fn new(api_key: Option<String>) -> CwaResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> CwaResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CwaError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            county: DEFAULT_CITY.to_string(),
        })
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    fn dataset_url<D: ForecastDataset>(&self) -> String {
        format!("{}/{}", self.base_url, D::DATASET_ID)
    }

    fn query<D: ForecastDataset>(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("Authorization", api_key.to_string()),
            ("CountyName", self.county.clone()),
        ];
        if D::EXPLICIT_JSON {
            query.push(("format", "JSON".to_string()));
        }
        query
    }

    /// Fetch one dataset and narrow it to `district`.
    ///
    /// `Ok(None)` means the dataset has no entry for the district.
    #[instrument(skip(self), fields(dataset = D::DATASET_ID))]
    pub async fn district_forecast<D: ForecastDataset>(
        &self,
        district: &str,
    ) -> CwaResult<Option<DistrictForecast<D::Entry>>> {
        let api_key = self.api_key.as_deref().ok_or(CwaError::MissingApiKey)?;

        let response = self
            .client
            .get(self.dataset_url::<D>())
            .query(&self.query::<D>(api_key))
            .send()
            .await
            .map_err(|e| CwaError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "CWA request rejected");
            return Err(CwaError::Status(status.as_u16()));
        }

        let payload: Payload = response
            .json()
            .await
            .map_err(|e| CwaError::Decode(e.to_string()))?;

        let forecast = payload.district::<D>(&self.county, district);
        debug!(found = forecast.is_some(), "Parsed CWA payload");
        Ok(forecast)
    }

    /// Resolve `point` to a district, then fetch that district's forecast.
    ///
    /// `Ok(None)` when the point resolves to no district or the dataset has
    /// nothing for it.
    pub async fn forecast_by_point<D, S>(
        &self,
        resolver: &RegionResolver,
        store: &S,
        point: Point,
    ) -> GeoResult<Option<DistrictForecast<D::Entry>>>
    where
        D: ForecastDataset,
        S: SpatialStore + ?Sized,
    {
        let Some(resolved) = resolver.resolve(store, point).await? else {
            return Ok(None);
        };
        Ok(self.district_forecast::<D>(&resolved.region.name).await?)
    }
}
