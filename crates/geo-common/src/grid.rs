//! Pollutant grids returned by the upstream atmospheric source.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Factor from kilograms to micrograms.
const KG_TO_UG: f64 = 1e9;

/// Exact coordinates of an upstream grid cell.
///
/// Used as the dedup key of the measurement cache, so values are kept
/// exactly as decoded and never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPointKey {
    pub lat: f64,
    pub lon: f64,
}

impl GridPointKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Bitwise identity, suitable for hashing in memory.
    pub fn bits(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

/// The cell chosen for a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub grid_point: GridPointKey,
    pub value: f64,
    pub distance_m: f64,
}

/// Scalar field over a regular lat/lon grid, one value per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantGrid {
    /// Units as reported upstream, e.g. `kg m**-3`.
    pub units: String,
    pub cells: Vec<GridCell>,
}

impl PollutantGrid {
    pub fn new(units: impl Into<String>, cells: Vec<GridCell>) -> Self {
        Self {
            units: units.into(),
            cells,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Convert mass units to µg m-3. Grids already in micrograms pass through.
    pub fn into_micrograms(mut self) -> Self {
        if self.units.to_lowercase().contains("kg") {
            for cell in &mut self.cells {
                cell.value *= KG_TO_UG;
            }
            self.units = "µg m-3".to_string();
        }
        self
    }

    /// Nearest cell to `point`.
    ///
    /// Latitude and longitude are matched independently against the grid's
    /// axis values, the way a label-based nearest selection on a rectilinear
    /// grid works. If the grid is ragged and that combination is missing, the
    /// closest cell by surface distance is used instead.
    pub fn nearest(&self, point: &Point) -> Option<GridSample> {
        let lat = nearest_axis_value(self.cells.iter().map(|c| c.lat), point.lat)?;
        let lon = nearest_axis_value(self.cells.iter().map(|c| c.lon), point.lon)?;

        let cell = self
            .cells
            .iter()
            .find(|c| c.lat == lat && c.lon == lon)
            .or_else(|| {
                self.cells.iter().min_by(|a, b| {
                    let da = point.distance_to(&Point::new(a.lat, a.lon));
                    let db = point.distance_to(&Point::new(b.lat, b.lon));
                    da.total_cmp(&db)
                })
            })?;

        Some(GridSample {
            grid_point: GridPointKey::new(cell.lat, cell.lon),
            value: cell.value,
            distance_m: point.distance_to(&Point::new(cell.lat, cell.lon)),
        })
    }
}

fn nearest_axis_value(values: impl Iterator<Item = f64>, target: f64) -> Option<f64> {
    values
        .filter(|v| v.is_finite())
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
}
