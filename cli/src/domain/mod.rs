//! Domain logic for apache log aggregation
//!
//! - `catalog` - ArcGIS REST service catalog client and sync
//! - `ingest` - Log ingestion pipeline (parse, classify, batch, aggregate)
//! - `report` - Report feed assembly for the downstream renderer

pub mod catalog;
pub mod ingest;
pub mod report;
