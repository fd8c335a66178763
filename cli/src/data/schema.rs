//! SQLite schema definitions
//!
//! Version 1 is the aggregation schema (lookup, fact, summary, burst tables).
//! Version 2 adds the ingest ledger.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
///
/// Lookup ids use AUTOINCREMENT so an id is never recycled after retention
/// deletes its row; fact rows only ever reference live, stable ids.
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Dimension lookup tables (natural key -> surrogate id)
-- =============================================================================
CREATE TABLE IF NOT EXISTS ip_address_lut (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS referer_lut (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS user_agent_lut (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS service_lut (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    folder TEXT NOT NULL,
    service TEXT NOT NULL,
    service_type TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    UNIQUE (folder, service, service_type)
);

-- =============================================================================
-- 2. Hourly fact tables (one row per bucket and dimension id)
-- =============================================================================
CREATE TABLE IF NOT EXISTS ip_address_logs (
    date INTEGER NOT NULL,
    id INTEGER NOT NULL REFERENCES ip_address_lut(id) ON DELETE CASCADE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE (date, id)
);

CREATE INDEX IF NOT EXISTS idx_ip_address_logs_date ON ip_address_logs(date);

CREATE TABLE IF NOT EXISTS referer_logs (
    date INTEGER NOT NULL,
    id INTEGER NOT NULL REFERENCES referer_lut(id) ON DELETE CASCADE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE (date, id)
);

CREATE INDEX IF NOT EXISTS idx_referer_logs_date ON referer_logs(date);

CREATE TABLE IF NOT EXISTS user_agent_logs (
    date INTEGER NOT NULL,
    id INTEGER NOT NULL REFERENCES user_agent_lut(id) ON DELETE CASCADE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE (date, id)
);

CREATE INDEX IF NOT EXISTS idx_user_agent_logs_date ON user_agent_logs(date);

CREATE TABLE IF NOT EXISTS service_logs (
    date INTEGER NOT NULL,
    id INTEGER NOT NULL REFERENCES service_lut(id) ON DELETE CASCADE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0,
    export_mapdraws INTEGER NOT NULL DEFAULT 0,
    wms_mapdraws INTEGER NOT NULL DEFAULT 0,
    UNIQUE (date, id)
);

CREATE INDEX IF NOT EXISTS idx_service_logs_date ON service_logs(date);

-- =============================================================================
-- 3. Un-dimensioned tables: hourly summary and 1-minute burst
-- =============================================================================
CREATE TABLE IF NOT EXISTS summary (
    date INTEGER NOT NULL UNIQUE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0,
    mapdraws INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS burst (
    date INTEGER NOT NULL UNIQUE,
    hits INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    nbytes INTEGER NOT NULL DEFAULT 0
);

-- =============================================================================
-- 4. Ingest ledger (one row per processed log file)
-- =============================================================================
CREATE TABLE IF NOT EXISTS ingest_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    sha256 TEXT NOT NULL UNIQUE,
    line_count INTEGER NOT NULL DEFAULT 0,
    ingested_at INTEGER NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn test_schema_version_is_positive() {
        assert!(SCHEMA_VERSION > 0);
    }

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_schema_is_not_empty() {
        assert!(!SCHEMA.is_empty());
    }

    #[test]
    fn test_schema_contains_required_tables() {
        let required_tables = [
            "schema_version",
            "schema_migrations",
            "ip_address_lut",
            "referer_lut",
            "user_agent_lut",
            "service_lut",
            "ip_address_logs",
            "referer_logs",
            "user_agent_logs",
            "service_logs",
            "summary",
            "burst",
            "ingest_log",
        ];

        for table in required_tables {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "Schema missing table: {}",
                table
            );
        }
    }

    #[test]
    fn test_fact_tables_have_date_indexes() {
        for index in [
            "idx_ip_address_logs_date",
            "idx_referer_logs_date",
            "idx_user_agent_logs_date",
            "idx_service_logs_date",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE INDEX IF NOT EXISTS {}", index)),
                "Schema missing index: {}",
                index
            );
        }
    }

    #[test]
    fn test_lookup_ids_are_not_recycled() {
        // Retention deletes lookup rows; AUTOINCREMENT keeps their ids retired
        for lut in ["ip_address_lut", "referer_lut", "user_agent_lut", "service_lut"] {
            let start = SCHEMA.find(lut).unwrap();
            let table_sql = &SCHEMA[start..start + 200];
            assert!(
                table_sql.contains("AUTOINCREMENT"),
                "{} must use AUTOINCREMENT",
                lut
            );
        }
    }
}
