//! SQLite repositories
//!
//! Free functions over a pool, grouped by concern. Row types live in
//! `crate::data::types`. The four aggregation dimensions share one code path
//! wherever possible; [`DimensionTable`] carries the per-dimension table names
//! so lookup resolution, fact merging, retention, and reporting stay generic.

pub mod facts;
pub mod ingest;
pub mod lookup;
pub mod report;

/// Table wiring for one aggregation dimension
///
/// `key_expr` is a SQL expression over the lookup table aliased `l` that
/// renders the natural key as a single string for joins back out of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionTable {
    /// Dimension label used in logs and the report feed
    pub name: &'static str,
    /// Lookup table (natural key -> surrogate id)
    pub lut: &'static str,
    /// Hourly fact table
    pub facts: &'static str,
    pub key_expr: &'static str,
}

pub const IP_ADDRESS: DimensionTable = DimensionTable {
    name: "ip_address",
    lut: "ip_address_lut",
    facts: "ip_address_logs",
    key_expr: "l.name",
};

pub const REFERER: DimensionTable = DimensionTable {
    name: "referer",
    lut: "referer_lut",
    facts: "referer_logs",
    key_expr: "l.name",
};

pub const USER_AGENT: DimensionTable = DimensionTable {
    name: "user_agent",
    lut: "user_agent_lut",
    facts: "user_agent_logs",
    key_expr: "l.name",
};

pub const SERVICE: DimensionTable = DimensionTable {
    name: "service",
    lut: "service_lut",
    facts: "service_logs",
    key_expr: "l.folder || '/' || l.service || '/' || l.service_type",
};
