//! ADS retrieve API client.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use geo_common::{BoundingBox, FetchError, PollutantGrid, RunReference, UpstreamFetcher};

use crate::config::CamsConfig;
use crate::decode::decode_grib;
use crate::request::{CamsRequest, DATASET};

#[derive(Debug, Deserialize)]
struct JobStatus {
    #[serde(rename = "jobID")]
    job_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobResults {
    asset: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    value: AssetValue,
}

#[derive(Debug, Deserialize)]
struct AssetValue {
    href: String,
}

#[derive(Debug, PartialEq, Eq)]
enum JobState {
    Pending,
    Successful,
    Failed,
}

impl JobState {
    fn parse(status: &str) -> Self {
        match status {
            "successful" => JobState::Successful,
            "failed" | "rejected" | "dismissed" | "deleted" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

fn http_err(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Http(format!("request timed out: {}", e))
    } else {
        FetchError::Http(e.to_string())
    }
}

async fn check(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(FetchError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// CAMS fetcher over the Atmosphere Data Store.
pub struct CamsClient {
    client: Client,
    config: CamsConfig,
}

impl CamsClient {
    pub fn new(config: CamsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/retrieve/v1/{}", self.config.api_url, path)
    }

    /// Submit a job and return its id.
    async fn submit(&self, request: &CamsRequest) -> Result<JobStatus, FetchError> {
        let response = self
            .client
            .post(self.endpoint(&format!("processes/{}/execution", DATASET)))
            .header("PRIVATE-TOKEN", &self.config.api_key)
            .json(&serde_json::json!({ "inputs": request }))
            .send()
            .await
            .map_err(http_err)?;

        check(response)
            .await?
            .json::<JobStatus>()
            .await
            .map_err(|e| FetchError::Decode(format!("Invalid job response: {}", e)))
    }

    /// Poll until the job leaves the queue.
    async fn wait(&self, mut job: JobStatus) -> Result<String, FetchError> {
        let started = Instant::now();
        loop {
            match JobState::parse(&job.status) {
                JobState::Successful => return Ok(job.job_id),
                JobState::Failed => {
                    return Err(FetchError::NoData(format!(
                        "job {} ended with status {}",
                        job.job_id, job.status
                    )))
                }
                JobState::Pending => {}
            }

            if started.elapsed() > self.config.max_wait {
                return Err(FetchError::Timeout(self.config.max_wait));
            }
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .client
                .get(self.endpoint(&format!("jobs/{}", job.job_id)))
                .header("PRIVATE-TOKEN", &self.config.api_key)
                .send()
                .await
                .map_err(http_err)?;
            job = check(response)
                .await?
                .json::<JobStatus>()
                .await
                .map_err(|e| FetchError::Decode(format!("Invalid job status: {}", e)))?;
            debug!(job_id = %job.job_id, status = %job.status, "Polled job");
        }
    }

    async fn download(&self, job_id: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(self.endpoint(&format!("jobs/{}/results", job_id)))
            .header("PRIVATE-TOKEN", &self.config.api_key)
            .send()
            .await
            .map_err(http_err)?;
        let results = check(response)
            .await?
            .json::<JobResults>()
            .await
            .map_err(|e| FetchError::Decode(format!("Invalid job results: {}", e)))?;

        let response = self
            .client
            .get(&results.asset.value.href)
            .send()
            .await
            .map_err(http_err)?;
        check(response).await?.bytes().await.map_err(http_err)
    }
}

#[async_trait]
impl UpstreamFetcher for CamsClient {
    #[instrument(skip(self, area), fields(reference = %reference.label()))]
    async fn fetch(
        &self,
        reference: &RunReference,
        area: &BoundingBox,
    ) -> Result<PollutantGrid, FetchError> {
        let request = CamsRequest::pm25(reference, area);
        let job = self.submit(&request).await?;
        debug!(job_id = %job.job_id, "Submitted CAMS job");

        let job_id = self.wait(job).await?;
        let bytes = self.download(&job_id).await?;
        info!(job_id = %job_id, bytes = bytes.len(), "Downloaded CAMS result");

        // Decoding is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode_grib(&bytes))
            .await
            .map_err(|e| FetchError::Decode(format!("Decode task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_parse() {
        assert_eq!(JobState::parse("accepted"), JobState::Pending);
        assert_eq!(JobState::parse("running"), JobState::Pending);
        assert_eq!(JobState::parse("successful"), JobState::Successful);
        assert_eq!(JobState::parse("failed"), JobState::Failed);
    }

    #[test]
    fn test_job_payloads_deserialize() {
        let job: JobStatus =
            serde_json::from_str(r#"{"jobID":"abc-123","status":"accepted","type":"process"}"#)
                .unwrap();
        assert_eq!(job.job_id, "abc-123");

        let results: JobResults = serde_json::from_str(
            r#"{"asset":{"value":{
                "type":"application/x-grib",
                "href":"https://download/x.grib",
                "file:size":1024
            }}}"#,
        )
        .unwrap();
        assert_eq!(results.asset.value.href, "https://download/x.grib");
    }

    #[test]
    fn test_endpoint_layout() {
        let client = CamsClient::new(CamsConfig::new("https://ads.example/api/", "key")).unwrap();
        assert_eq!(
            client.endpoint("jobs/abc"),
            "https://ads.example/api/retrieve/v1/jobs/abc"
        );
    }
}
