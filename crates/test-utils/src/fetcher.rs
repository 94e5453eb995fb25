//! Scripted upstream fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use geo_common::{BoundingBox, FetchError, PollutantGrid, RunReference, UpstreamFetcher};
use tokio::sync::Barrier;

/// What the fetcher does for a given reference.
#[derive(Debug, Clone)]
pub enum FetchBehavior {
    Succeed(PollutantGrid),
    Fail,
    /// Sleep far longer than any per-attempt timeout.
    Hang,
}

/// Fetcher that replays configured behaviors and records every call.
pub struct ScriptedFetcher {
    default: FetchBehavior,
    by_label: HashMap<String, FetchBehavior>,
    calls: AtomicUsize,
    attempted: Mutex<Vec<String>>,
    barrier: Option<Arc<Barrier>>,
}

impl ScriptedFetcher {
    /// Every reference returns `grid`.
    pub fn returning(grid: PollutantGrid) -> Self {
        Self::with_default(FetchBehavior::Succeed(grid))
    }

    pub fn failing() -> Self {
        Self::with_default(FetchBehavior::Fail)
    }

    pub fn with_default(default: FetchBehavior) -> Self {
        Self {
            default,
            by_label: HashMap::new(),
            calls: AtomicUsize::new(0),
            attempted: Mutex::new(Vec::new()),
            barrier: None,
        }
    }

    /// Override the behavior for one reference label, e.g. "2025-07-01 12:00 UTC".
    pub fn on(mut self, label: &str, behavior: FetchBehavior) -> Self {
        self.by_label.insert(label.to_string(), behavior);
        self
    }

    /// Hold every call until `parties` calls are in flight at once.
    pub fn rendezvous(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Labels of every reference attempted, in call order.
    pub fn attempted(&self) -> Vec<String> {
        self.attempted
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UpstreamFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        reference: &RunReference,
        _area: &BoundingBox,
    ) -> Result<PollutantGrid, FetchError> {
        let label = reference.label();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut attempted) = self.attempted.lock() {
            attempted.push(label.clone());
        }

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        match self.by_label.get(&label).unwrap_or(&self.default) {
            FetchBehavior::Succeed(grid) => Ok(grid.clone()),
            FetchBehavior::Fail => Err(FetchError::NoData(label)),
            FetchBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Timeout(Duration::from_secs(3600)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_per_label_override() {
        let day = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let fetcher = ScriptedFetcher::returning(crate::taipei_pm25_grid())
            .on("2025-07-01 12:00 UTC", FetchBehavior::Fail);
        let area = BoundingBox::taipei();

        assert!(fetcher.fetch(&RunReference::new(day, 12), &area).await.is_err());
        assert!(fetcher.fetch(&RunReference::new(day, 0), &area).await.is_ok());
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(
            fetcher.attempted(),
            vec!["2025-07-01 12:00 UTC", "2025-07-01 00:00 UTC"]
        );
    }
}
