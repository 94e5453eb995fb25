//! City-safety API service library.
//!
//! Routes are thin: parse and validate the query, run one of the locator
//! lookups against the PostGIS stores, and shape the JSON the mobile client
//! expects.

pub mod config;
pub mod error;
pub mod geojson;
pub mod handlers;
pub mod params;
pub mod routes;
pub mod state;
