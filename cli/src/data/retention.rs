//! Retention management for the aggregate store
//!
//! Each dimension has its own window: fact rows older than the cutoff are
//! deleted first, then lookup rows no fact row references anymore. The burst
//! table is purged on a shorter window of its own. Runs from the
//! `prune-database` subcommand, never concurrently with ingestion.

use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;

use crate::core::config::RetentionConfig;
use crate::data::StoreError;
use crate::data::repositories::{DimensionTable, IP_ADDRESS, REFERER, SERVICE, USER_AGENT};

/// Result of a retention run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetentionResult {
    /// Fact rows deleted across all dimensions
    pub fact_rows: u64,
    /// Orphaned lookup rows deleted across all dimensions
    pub lookup_rows: u64,
    /// Burst buckets deleted
    pub burst_rows: u64,
}

/// Run retention cleanup based on config
///
/// Vacuums afterwards so freed pages are returned to the filesystem.
pub async fn run_retention(
    pool: &SqlitePool,
    config: &RetentionConfig,
) -> Result<RetentionResult, StoreError> {
    let mut result = RetentionResult::default();

    let windows = [
        (&IP_ADDRESS, config.ip_days),
        (&REFERER, config.referer_days),
        (&USER_AGENT, config.user_agent_days),
        (&SERVICE, config.service_days),
    ];

    for (dim, days) in windows {
        let (facts, lookups) = purge_dimension(pool, dim, days).await?;
        if facts > 0 || lookups > 0 {
            tracing::debug!(
                dimension = dim.name,
                facts,
                lookups,
                days,
                "Expired dimension rows"
            );
        }
        result.fact_rows += facts;
        result.lookup_rows += lookups;
    }

    result.burst_rows = purge_burst(pool, config.burst_days).await?;

    // VACUUM cannot run inside a transaction
    sqlx::query("VACUUM").execute(pool).await?;

    tracing::debug!(
        fact_rows = result.fact_rows,
        lookup_rows = result.lookup_rows,
        burst_rows = result.burst_rows,
        "Retention cleanup completed, vacuum done"
    );
    Ok(result)
}

/// Delete expired facts for one dimension, then its orphaned lookup rows
///
/// Returns (fact rows deleted, lookup rows deleted). Service lookup rows
/// still marked active survive orphan cleanup: the catalog owns them, not
/// the traffic.
async fn purge_dimension(
    pool: &SqlitePool,
    dim: &DimensionTable,
    days: u32,
) -> Result<(u64, u64), StoreError> {
    let cutoff = (Utc::now() - TimeDelta::days(i64::from(days))).timestamp();

    let mut tx = pool.begin().await?;

    let facts_sql = format!("DELETE FROM {} WHERE date < ?", dim.facts);
    let facts = sqlx::query(&facts_sql)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let mut orphan_sql = format!(
        "DELETE FROM {} WHERE id NOT IN (SELECT id FROM {})",
        dim.lut, dim.facts
    );
    if dim.lut == "service_lut" {
        orphan_sql.push_str(" AND active = 0");
    }
    let lookups = sqlx::query(&orphan_sql)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok((facts, lookups))
}

/// Delete burst buckets older than the burst window
async fn purge_burst(pool: &SqlitePool, days: u32) -> Result<u64, StoreError> {
    let cutoff = (Utc::now() - TimeDelta::days(i64::from(days))).timestamp();

    let deleted = sqlx::query("DELETE FROM burst WHERE date < ?")
        .bind(cutoff)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted > 0 {
        tracing::debug!(deleted, days, "Expired burst buckets");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::{facts, lookup};
    use crate::data::types::{BurstRow, FactRow, ServiceFactRow, ServiceKey};

    async fn setup_test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn days_ago(days: i64) -> i64 {
        (Utc::now() - TimeDelta::days(days)).timestamp()
    }

    fn test_config() -> RetentionConfig {
        RetentionConfig {
            service_days: 30,
            ip_days: 30,
            referer_days: 7,
            user_agent_days: 7,
            burst_days: 14,
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let pool = setup_test_pool().await;

        let result = run_retention(&pool, &test_config()).await.unwrap();
        assert_eq!(result, RetentionResult::default());
    }

    #[tokio::test]
    async fn test_expired_facts_and_orphans_removed() {
        let pool = setup_test_pool().await;
        let ids = lookup::resolve_names(&pool, &IP_ADDRESS, &["10.0.0.1", "10.0.0.2"])
            .await
            .unwrap();

        let rows = vec![
            // 10.0.0.1 only has over-age traffic, 10.0.0.2 stays current
            FactRow { date: days_ago(45), id: ids["10.0.0.1"], hits: 4, errors: 0, nbytes: 0 },
            FactRow { date: days_ago(1), id: ids["10.0.0.2"], hits: 2, errors: 0, nbytes: 0 },
        ];
        facts::merge_dimension_facts(&pool, &IP_ADDRESS, &rows)
            .await
            .unwrap();

        let result = run_retention(&pool, &test_config()).await.unwrap();
        assert_eq!(result.fact_rows, 1);
        assert_eq!(result.lookup_rows, 1);

        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM ip_address_lut")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec![("10.0.0.2".to_string(),)]);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ip_address_logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_no_overage_rows_survive() {
        let pool = setup_test_pool().await;
        let ids = lookup::resolve_names(&pool, &REFERER, &["https://example.gov/map"])
            .await
            .unwrap();

        let rows = vec![
            FactRow {
                date: days_ago(8),
                id: ids["https://example.gov/map"],
                hits: 1,
                errors: 0,
                nbytes: 0,
            },
            FactRow {
                date: days_ago(6),
                id: ids["https://example.gov/map"],
                hits: 1,
                errors: 0,
                nbytes: 0,
            },
        ];
        facts::merge_dimension_facts(&pool, &REFERER, &rows)
            .await
            .unwrap();

        run_retention(&pool, &test_config()).await.unwrap();

        let cutoff = days_ago(7);
        let overage: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM referer_logs WHERE date < ?")
                .bind(cutoff)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(overage, 0);

        // Referer still referenced by the recent bucket, so the lut row stays
        let lut_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referer_lut")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(lut_count, 1);
    }

    #[tokio::test]
    async fn test_active_service_survives_orphan_cleanup() {
        let pool = setup_test_pool().await;

        let published = ServiceKey::new("NWS_Forecasts", "watch_warn_adv", "MapServer");
        let retired = ServiceKey::new("legacy", "old_overlay", "MapServer");
        let ids = lookup::resolve_services(&pool, &[published.clone(), retired.clone()])
            .await
            .unwrap();
        lookup::deactivate_services(&pool, std::slice::from_ref(&retired))
            .await
            .unwrap();

        // Only over-age traffic for the retired service
        let rows = vec![ServiceFactRow {
            date: days_ago(60),
            id: ids[&retired],
            hits: 1,
            errors: 0,
            nbytes: 0,
            export_mapdraws: 0,
            wms_mapdraws: 0,
        }];
        facts::merge_service_facts(&pool, &rows).await.unwrap();

        run_retention(&pool, &test_config()).await.unwrap();

        // Catalog-seeded (active, no facts) survives; retired orphan is gone
        let keys: Vec<(String,)> = sqlx::query_as("SELECT folder FROM service_lut")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(keys, vec![("NWS_Forecasts".to_string(),)]);
    }

    #[tokio::test]
    async fn test_burst_window_is_independent() {
        let pool = setup_test_pool().await;

        let rows = vec![
            BurstRow { date: days_ago(15), hits: 1, errors: 0, nbytes: 0 },
            BurstRow { date: days_ago(13), hits: 2, errors: 0, nbytes: 0 },
        ];
        facts::merge_burst(&pool, &rows).await.unwrap();

        let result = run_retention(&pool, &test_config()).await.unwrap();
        assert_eq!(result.burst_rows, 1);

        let remaining: Vec<(i64,)> = sqlx::query_as("SELECT hits FROM burst")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec![(2,)]);
    }
}
