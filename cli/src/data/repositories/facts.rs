//! Fact-table merge repository
//!
//! Accumulating upserts: a bucket row is inserted on first sight and summed
//! into on conflict, never overwritten. Each merge call is one transaction,
//! so a dimension lands all-or-nothing.

use sqlx::SqlitePool;

use crate::data::StoreError;
use crate::data::repositories::DimensionTable;
use crate::data::types::{BurstRow, FactRow, ServiceFactRow, SummaryRow};

/// Merge hourly buckets for a string dimension
///
/// Returns the number of buckets merged.
pub async fn merge_dimension_facts(
    pool: &SqlitePool,
    dim: &DimensionTable,
    rows: &[FactRow],
) -> Result<u64, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        r#"
        INSERT INTO {} (date, id, hits, errors, nbytes)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(date, id) DO UPDATE SET
            hits = hits + excluded.hits,
            errors = errors + excluded.errors,
            nbytes = nbytes + excluded.nbytes
        "#,
        dim.facts
    );

    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(&sql)
            .bind(row.date)
            .bind(row.id)
            .bind(row.hits)
            .bind(row.errors)
            .bind(row.nbytes)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(rows.len() as u64)
}

/// Merge hourly buckets for the service dimension
pub async fn merge_service_facts(
    pool: &SqlitePool,
    rows: &[ServiceFactRow],
) -> Result<u64, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO service_logs (date, id, hits, errors, nbytes, export_mapdraws, wms_mapdraws)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date, id) DO UPDATE SET
                hits = hits + excluded.hits,
                errors = errors + excluded.errors,
                nbytes = nbytes + excluded.nbytes,
                export_mapdraws = export_mapdraws + excluded.export_mapdraws,
                wms_mapdraws = wms_mapdraws + excluded.wms_mapdraws
            "#,
        )
        .bind(row.date)
        .bind(row.id)
        .bind(row.hits)
        .bind(row.errors)
        .bind(row.nbytes)
        .bind(row.export_mapdraws)
        .bind(row.wms_mapdraws)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(rows.len() as u64)
}

/// Merge hourly all-traffic summary buckets
pub async fn merge_summary(pool: &SqlitePool, rows: &[SummaryRow]) -> Result<u64, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO summary (date, hits, errors, nbytes, mapdraws)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                hits = hits + excluded.hits,
                errors = errors + excluded.errors,
                nbytes = nbytes + excluded.nbytes,
                mapdraws = mapdraws + excluded.mapdraws
            "#,
        )
        .bind(row.date)
        .bind(row.hits)
        .bind(row.errors)
        .bind(row.nbytes)
        .bind(row.mapdraws)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(rows.len() as u64)
}

/// Merge 1-minute burst buckets
pub async fn merge_burst(pool: &SqlitePool, rows: &[BurstRow]) -> Result<u64, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO burst (date, hits, errors, nbytes)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                hits = hits + excluded.hits,
                errors = errors + excluded.errors,
                nbytes = nbytes + excluded.nbytes
            "#,
        )
        .bind(row.date)
        .bind(row.hits)
        .bind(row.errors)
        .bind(row.nbytes)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::{IP_ADDRESS, lookup};

    async fn setup_test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn ip_bucket(pool: &SqlitePool, date: i64, id: i64) -> Option<(i64, i64, i64)> {
        sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT hits, errors, nbytes FROM ip_address_logs WHERE date = ? AND id = ?",
        )
        .bind(date)
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_merge_inserts_new_buckets() {
        let pool = setup_test_pool().await;
        let ids = lookup::resolve_names(&pool, &IP_ADDRESS, &["10.0.0.1"])
            .await
            .unwrap();
        let id = ids["10.0.0.1"];

        let rows = vec![FactRow {
            date: 1_563_404_400,
            id,
            hits: 5,
            errors: 1,
            nbytes: 2048,
        }];
        let merged = merge_dimension_facts(&pool, &IP_ADDRESS, &rows).await.unwrap();

        assert_eq!(merged, 1);
        assert_eq!(ip_bucket(&pool, 1_563_404_400, id).await, Some((5, 1, 2048)));
    }

    #[tokio::test]
    async fn test_merge_accumulates_on_conflict() {
        let pool = setup_test_pool().await;
        let ids = lookup::resolve_names(&pool, &IP_ADDRESS, &["10.0.0.1"])
            .await
            .unwrap();
        let id = ids["10.0.0.1"];

        let rows = vec![FactRow {
            date: 1_563_404_400,
            id,
            hits: 5,
            errors: 1,
            nbytes: 2048,
        }];
        merge_dimension_facts(&pool, &IP_ADDRESS, &rows).await.unwrap();
        merge_dimension_facts(&pool, &IP_ADDRESS, &rows).await.unwrap();

        // Re-merging the same buckets doubles the sums and adds no rows
        assert_eq!(
            ip_bucket(&pool, 1_563_404_400, id).await,
            Some((10, 2, 4096))
        );
        let row_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ip_address_logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row_count, 1);
    }

    #[tokio::test]
    async fn test_merge_empty_batch() {
        let pool = setup_test_pool().await;

        let merged = merge_dimension_facts(&pool, &IP_ADDRESS, &[]).await.unwrap();
        assert_eq!(merged, 0);
    }

    #[tokio::test]
    async fn test_merge_service_accumulates_mapdraws() {
        let pool = setup_test_pool().await;
        let key = crate::data::types::ServiceKey::new("NWS_Forecasts", "wwa", "MapServer");
        let ids = lookup::resolve_services(&pool, std::slice::from_ref(&key))
            .await
            .unwrap();
        let id = ids[&key];

        let rows = vec![ServiceFactRow {
            date: 1_563_404_400,
            id,
            hits: 10,
            errors: 0,
            nbytes: 4096,
            export_mapdraws: 3,
            wms_mapdraws: 2,
        }];
        merge_service_facts(&pool, &rows).await.unwrap();
        merge_service_facts(&pool, &rows).await.unwrap();

        let row: (i64, i64, i64) = sqlx::query_as(
            "SELECT hits, export_mapdraws, wms_mapdraws FROM service_logs WHERE date = ? AND id = ?",
        )
        .bind(1_563_404_400_i64)
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row, (20, 6, 4));
    }

    #[tokio::test]
    async fn test_merge_summary_conflicts_on_date() {
        let pool = setup_test_pool().await;

        let rows = vec![
            SummaryRow {
                date: 1_563_404_400,
                hits: 100,
                errors: 4,
                nbytes: 1_000_000,
                mapdraws: 12,
            },
            SummaryRow {
                date: 1_563_408_000,
                hits: 50,
                errors: 0,
                nbytes: 500_000,
                mapdraws: 3,
            },
        ];
        merge_summary(&pool, &rows).await.unwrap();
        merge_summary(&pool, &rows[..1]).await.unwrap();

        let first: (i64, i64) =
            sqlx::query_as("SELECT hits, mapdraws FROM summary WHERE date = ?")
                .bind(1_563_404_400_i64)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(first, (200, 24));

        let second: (i64, i64) =
            sqlx::query_as("SELECT hits, mapdraws FROM summary WHERE date = ?")
                .bind(1_563_408_000_i64)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(second, (50, 3));
    }

    #[tokio::test]
    async fn test_merge_burst_minute_buckets() {
        let pool = setup_test_pool().await;

        let rows = vec![
            BurstRow {
                date: 1_563_406_800,
                hits: 7,
                errors: 1,
                nbytes: 700,
            },
            BurstRow {
                date: 1_563_406_860,
                hits: 9,
                errors: 0,
                nbytes: 900,
            },
        ];
        merge_burst(&pool, &rows).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM burst")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let total: (i64,) = sqlx::query_as("SELECT SUM(hits) FROM burst")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total.0, 16);
    }
}
