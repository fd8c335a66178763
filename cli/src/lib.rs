//! Incremental apache access-log aggregation for ArcGIS server deployments.
//!
//! Parses combined-format access logs, classifies requests against the ArcGIS
//! REST/WMS URL grammar, and maintains per-project SQLite stores of
//! time-bucketed usage facts (hits, errors, bytes, map draws) keyed by
//! surrogate dimension ids.

mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
