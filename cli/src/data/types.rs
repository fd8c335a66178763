//! Shared data types for the aggregate store
//!
//! Row types exchanged between the ingest pipeline, the repositories, and the
//! report feed. Kept together so the merge input shape and the query result
//! shape stay in sync with the schema.

use serde::Serialize;

// ============================================================================
// Dimension keys
// ============================================================================

/// Natural key of the service dimension
///
/// Captured from the request path by the classifier and from the catalog
/// listing by the sync commands. Case is preserved as observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub folder: String,
    pub service: String,
    pub service_type: String,
}

impl ServiceKey {
    pub fn new(
        folder: impl Into<String>,
        service: impl Into<String>,
        service_type: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            service: service.into(),
            service_type: service_type.into(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.folder, self.service, self.service_type)
    }
}

// ============================================================================
// Fact rows (merge input)
// ============================================================================

/// One hourly bucket for a string dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
    pub date: i64,
    pub id: i64,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
}

/// One hourly bucket for the service dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFactRow {
    pub date: i64,
    pub id: i64,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
    pub export_mapdraws: i64,
    pub wms_mapdraws: i64,
}

/// One hourly bucket of all traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub date: i64,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
    pub mapdraws: i64,
}

/// One 1-minute bucket of all traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurstRow {
    pub date: i64,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
}

// ============================================================================
// Report feed rows (query results)
// ============================================================================

/// Summary resampled to one row per day
#[derive(Debug, Clone, Serialize)]
pub struct SummaryDay {
    pub date: i64,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
    pub mapdraws: i64,
}

/// One hourly bucket joined back to its natural key
#[derive(Debug, Clone, Serialize)]
pub struct HourlyPoint {
    pub date: i64,
    pub name: String,
    pub hits: i64,
    pub errors: i64,
    pub nbytes: i64,
}

/// One ranked entry from a top-N query
#[derive(Debug, Clone, Serialize)]
pub struct TopEntry {
    pub name: String,
    pub value: i64,
}

/// Metric a top-N query ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Hits,
    Errors,
    Nbytes,
}

impl Metric {
    /// Fact-table column backing this metric
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Hits => "hits",
            Metric::Errors => "errors",
            Metric::Nbytes => "nbytes",
        }
    }
}
