//! Service tunables loaded from YAML.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use geo_common::bbox::BoundingBox;
use geo_common::bucket::DEFAULT_BUCKET_DECIMALS;
use geo_common::time::{taipei_offset, DEFAULT_SLOT_MINUTES};
use geo_common::SlotGrid;
use locator::cache::DEFAULT_ATTEMPT_TIMEOUT;
use locator::proximity::DEFAULT_RADIUS_M;
use locator::region::DEFAULT_TOLERANCE_M;
use locator::CacheSettings;

/// Everything optional in `config/geo-api.yaml`. Missing keys keep defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upstream request area as `[north, west, south, east]`.
    pub aqi_area: [f64; 4],
    pub attempt_timeout_secs: u64,
    pub slot_minutes: u32,
    pub bucket_decimals: u32,
    pub region_tolerance_m: f64,
    pub default_radius_m: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            aqi_area: BoundingBox::taipei().to_nwse(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            bucket_decimals: DEFAULT_BUCKET_DECIMALS,
            region_tolerance_m: DEFAULT_TOLERANCE_M,
            default_radius_m: DEFAULT_RADIUS_M,
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file {:?} does not exist, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let config: ServiceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse: {:?}", path))?;
        config.validate()?;

        tracing::info!("Loaded service config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let [north, west, south, east] = self.aqi_area;
        anyhow::ensure!(
            north > south && east > west,
            "aqi_area must be [north, west, south, east], got {:?}",
            self.aqi_area
        );
        anyhow::ensure!(
            self.slot_minutes > 0 && 1440 % self.slot_minutes == 0,
            "slot_minutes must divide a day, got {}",
            self.slot_minutes
        );
        anyhow::ensure!(
            self.bucket_decimals <= 6,
            "bucket_decimals must be at most 6"
        );
        anyhow::ensure!(
            self.region_tolerance_m >= 0.0 && self.default_radius_m > 0.0,
            "distances must be positive"
        );
        Ok(())
    }

    pub fn area(&self) -> BoundingBox {
        let [north, west, south, east] = self.aqi_area;
        BoundingBox::new(west, south, east, north)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            area: self.area(),
            slots: SlotGrid::new(self.slot_minutes, taipei_offset()),
            bucket_decimals: self.bucket_decimals,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServiceConfig::load(Path::new("/nonexistent/geo-api.yaml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.area(), BoundingBox::taipei());
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "slot_minutes: 15\nattempt_timeout_secs: 30").unwrap();

        let config = ServiceConfig::load(file.path()).unwrap();
        assert_eq!(config.slot_minutes, 15);
        assert_eq!(config.bucket_decimals, DEFAULT_BUCKET_DECIMALS);
        assert_eq!(
            config.cache_settings().attempt_timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_invalid_area_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "aqi_area: [24.9, 121.3, 25.3, 121.7]").unwrap();

        assert!(ServiceConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_slot_width_must_divide_day() {
        let config = ServiceConfig {
            slot_minutes: 7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
