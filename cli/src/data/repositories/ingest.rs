//! Ingest-ledger repository
//!
//! One row per successfully processed log file, keyed by the SHA-256 of the
//! raw file bytes. `parse-logs` checks the ledger before aggregating and
//! records after, giving exactly-once semantics per input file.

use sqlx::SqlitePool;

use crate::data::StoreError;

/// Whether a file with this content digest has already been ingested
pub async fn is_ingested(pool: &SqlitePool, sha256: &str) -> Result<bool, StoreError> {
    let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingest_log WHERE sha256 = ?")
        .bind(sha256)
        .fetch_one(pool)
        .await?;

    Ok(result.0 > 0)
}

/// Record a completed ingest
///
/// A forced re-ingest of a known digest refreshes the existing row.
pub async fn record_ingest(
    pool: &SqlitePool,
    source: &str,
    sha256: &str,
    line_count: i64,
) -> Result<(), StoreError> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO ingest_log (source, sha256, line_count, ingested_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(sha256) DO UPDATE SET
            source = excluded.source,
            line_count = excluded.line_count,
            ingested_at = excluded.ingested_at
        "#,
    )
    .bind(source)
    .bind(sha256)
    .bind(line_count)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
