//! Log ingestion pipeline
//!
//! This module contains the ingestion pipeline:
//!
//! - `parse` - Stage 1: combined-format line -> RawRecord
//! - `classify` - Stage 2: service classification against the ArcGIS URL grammar
//! - `batch` - bounded buffer of classified records
//! - `aggregate` - Stage 3: time-bucket grouping and merge into the store
//! - `pipeline` - pipeline orchestrator

mod aggregate;
mod batch;
mod classify;
mod parse;
mod pipeline;

// Public API - only types needed by external modules
pub use aggregate::{BatchAggregates, FlushCounts};
pub use batch::Batch;
pub use classify::{ClassifiedRecord, PathClassifier, ServiceHit};
pub use parse::{MalformedLine, RawRecord, parse_line};
pub use pipeline::{IngestError, IngestReport, LogPipeline, open_log_file, stdin_reader};
