//! Query-string parsing.
//!
//! Parameters arrive as raw strings so that malformed values produce the
//! service's own `{"error": ...}` body instead of an extractor rejection.

use std::str::FromStr;

use serde::Deserialize;

use geo_common::{GeoError, GeoResult, Point};

/// Parse an optional raw value, falling back to `default` when absent.
pub fn parse_or<T: FromStr>(
    raw: Option<&str>,
    default: T,
    param: &str,
    message: &str,
) -> GeoResult<T> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| GeoError::invalid(param, message)),
    }
}

/// `1`, `true`, `yes` and `on` (any case) are true; anything else is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct PointParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl PointParams {
    pub fn point(&self) -> GeoResult<Point> {
        let coordinate = |raw: &Option<String>| -> GeoResult<f64> {
            raw.as_deref()
                .map(str::trim)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| GeoError::invalid("lat/lon", "lat/lon required"))
        };
        Point::validated(coordinate(&self.lat)?, coordinate(&self.lon)?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageParams {
    /// `(limit, offset)` with `1 <= limit <= max_limit` when a limit applies.
    ///
    /// An absent `limit` falls back to `default_limit`, which may be `None`
    /// for catalogs served whole.
    pub fn page(
        &self,
        default_limit: Option<usize>,
        max_limit: usize,
    ) -> GeoResult<(Option<usize>, usize)> {
        const MESSAGE: &str = "invalid limit/offset";
        let offset: i64 = parse_or(self.offset.as_deref(), 0, "offset", MESSAGE)?;
        if offset < 0 {
            return Err(GeoError::invalid("offset", MESSAGE));
        }

        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => default_limit,
            Some(_) => {
                let limit: i64 = parse_or(self.limit.as_deref(), 0, "limit", MESSAGE)?;
                if limit <= 0 || limit as usize > max_limit {
                    return Err(GeoError::invalid("limit", MESSAGE));
                }
                Some(limit as usize)
            }
        };
        Ok((limit, offset as usize))
    }
}
