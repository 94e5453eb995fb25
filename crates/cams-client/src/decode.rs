//! GRIB decoding of downloaded CAMS results.

use std::io::Cursor;

use geo_common::{FetchError, GridCell, PollutantGrid};
use tracing::debug;

/// Units of the CAMS `pm2p5` parameter.
pub const CAMS_PM25_UNITS: &str = "kg m**-3";

/// Decode a GRIB2 file into a grid holding the mean of all its messages.
///
/// CAMS returns one message per forecast step over the same grid, so the
/// result is the lead-time mean per grid point.
pub fn decode_grib(bytes: &[u8]) -> Result<PollutantGrid, FetchError> {
    let grib2 = grib::from_reader(Cursor::new(bytes))
        .map_err(|e| FetchError::Decode(format!("Failed to parse GRIB: {}", e)))?;

    let mut coords: Option<Vec<(f64, f64)>> = None;
    let mut messages: Vec<Vec<f32>> = Vec::new();

    for (_index, submsg) in grib2.iter() {
        if coords.is_none() {
            let latlons = submsg
                .latlons()
                .map_err(|e| FetchError::Decode(format!("Unsupported grid: {}", e)))?;
            coords = Some(
                latlons
                    .map(|(lat, lon)| (lat as f64, normalize_lon(lon as f64)))
                    .collect(),
            );
        }

        let decoder = grib::Grib2SubmessageDecoder::from(submsg)
            .map_err(|e| FetchError::Decode(format!("Failed to create decoder: {}", e)))?;
        let values = decoder
            .dispatch()
            .map_err(|e| FetchError::Decode(format!("Failed to decode values: {}", e)))?
            .collect();
        messages.push(values);
    }

    let coords = coords.ok_or_else(|| FetchError::NoData("GRIB file has no messages".to_string()))?;
    debug!(messages = messages.len(), points = coords.len(), "Decoded GRIB");

    Ok(PollutantGrid::new(
        CAMS_PM25_UNITS,
        mean_over_messages(&coords, &messages)?,
    ))
}

/// Average `messages` point-wise over `coords`, ignoring missing values.
///
/// Points with no valid value in any message are dropped.
pub fn mean_over_messages(
    coords: &[(f64, f64)],
    messages: &[Vec<f32>],
) -> Result<Vec<GridCell>, FetchError> {
    let mut sums = vec![0.0f64; coords.len()];
    let mut counts = vec![0u32; coords.len()];

    for (step, values) in messages.iter().enumerate() {
        if values.len() != coords.len() {
            return Err(FetchError::Decode(format!(
                "Message {} has {} values for {} grid points",
                step,
                values.len(),
                coords.len()
            )));
        }
        for (i, v) in values.iter().enumerate() {
            if v.is_finite() {
                sums[i] += *v as f64;
                counts[i] += 1;
            }
        }
    }

    Ok(coords
        .iter()
        .zip(sums.iter().zip(&counts))
        .filter(|(_, (_, count))| **count > 0)
        .map(|(&(lat, lon), (&sum, &count))| GridCell {
            lat,
            lon,
            value: sum / count as f64,
        })
        .collect())
}

fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_over_lead_times() {
        let coords = vec![(25.3, 121.3), (25.3, 121.7)];
        let messages = vec![vec![1.0e-8, 2.0e-8], vec![3.0e-8, f32::NAN]];

        let cells = mean_over_messages(&coords, &messages).unwrap();

        assert_eq!(cells.len(), 2);
        assert!((cells[0].value - 2.0e-8).abs() < 1e-12);
        assert!((cells[1].value - 2.0e-8).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_point_dropped() {
        let coords = vec![(25.3, 121.3), (24.9, 121.3)];
        let messages = vec![vec![1.0e-8, f32::NAN]];
        let cells = mean_over_messages(&coords, &messages).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].lat, 25.3);
    }

    #[test]
    fn test_mismatched_message_rejected() {
        let coords = vec![(25.3, 121.3)];
        let messages = vec![vec![1.0e-8, 2.0e-8]];
        assert!(matches!(
            mean_over_messages(&coords, &messages),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(decode_grib(b"not a grib file").is_err());
    }

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon(121.5), 121.5);
        assert_eq!(normalize_lon(238.5), -121.5);
    }
}
