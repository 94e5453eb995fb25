//! Shared test utilities for the city-safety workspace.
//!
//! - In-memory [`SpatialStore`](geo_common::SpatialStore) and
//!   [`MeasurementStore`](geo_common::MeasurementStore) implementations with
//!   the same uniqueness guarantees as the PostGIS schema
//! - A scripted upstream fetcher that counts its calls
//! - Small Taipei fixtures (districts, sites, a 0.4 degree PM2.5 grid)
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fetcher;
pub mod fixtures;
pub mod memory;

pub use fetcher::{FetchBehavior, ScriptedFetcher};
pub use fixtures::*;
pub use memory::{MemoryMeasurementStore, MemorySpatialStore};

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(49.9, 50.0, 0.5);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  \
                 diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
