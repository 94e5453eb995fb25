//! PostgreSQL + PostGIS storage for the city-safety services.
//!
//! - [`Database`]: pool, schema migration, readiness
//! - [`PgSpatialStore`]: districts and site catalogs
//! - [`PgMeasurementStore`]: the AQI cache tables
//! - [`DeviceRegistry`]: FCM device tokens

pub mod database;
pub mod devices;
pub mod measurements;
mod schema;
pub mod spatial;

pub use database::Database;
pub use devices::{DeviceRegistration, DeviceRegistry};
pub use measurements::PgMeasurementStore;
pub use spatial::PgSpatialStore;
