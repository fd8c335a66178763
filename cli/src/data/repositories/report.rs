//! Report-feed repository
//!
//! Read-only queries joining fact tables back to natural keys. Windows are
//! anchored on the newest data in the store rather than the wall clock, so a
//! feed built from a historical archive still covers its own last days.

use sqlx::SqlitePool;

use crate::core::constants::{DAY_SECS, HOUR_BUCKET_SECS};
use crate::data::StoreError;
use crate::data::repositories::DimensionTable;
use crate::data::types::{BurstRow, HourlyPoint, Metric, SummaryDay, TopEntry};

async fn max_date(pool: &SqlitePool, table: &str) -> Result<Option<i64>, StoreError> {
    let result: (Option<i64>,) = sqlx::query_as(&format!("SELECT MAX(date) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(result.0)
}

/// Daily resample of the summary table over its last `days` days
pub async fn summary_daily(pool: &SqlitePool, days: i64) -> Result<Vec<SummaryDay>, StoreError> {
    let Some(latest) = max_date(pool, "summary").await? else {
        return Ok(Vec::new());
    };
    let cutoff = (latest / DAY_SECS) * DAY_SECS - (days - 1) * DAY_SECS;

    let rows = sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
        r#"
        SELECT (date / 86400) * 86400 AS day,
               SUM(hits), SUM(errors), SUM(nbytes), SUM(mapdraws)
        FROM summary
        WHERE date >= ?
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(date, hits, errors, nbytes, mapdraws)| SummaryDay {
            date,
            hits,
            errors,
            nbytes,
            mapdraws,
        })
        .collect())
}

/// Hourly buckets for a dimension over its last `days` days, joined to keys
pub async fn dimension_hourly(
    pool: &SqlitePool,
    dim: &DimensionTable,
    days: i64,
) -> Result<Vec<HourlyPoint>, StoreError> {
    let Some(latest) = max_date(pool, dim.facts).await? else {
        return Ok(Vec::new());
    };
    let cutoff = (latest / DAY_SECS) * DAY_SECS - (days - 1) * DAY_SECS;

    let sql = format!(
        r#"
        SELECT f.date, {} AS name, f.hits, f.errors, f.nbytes
        FROM {} f
        JOIN {} l ON l.id = f.id
        WHERE f.date >= ?
        ORDER BY f.date, name
        "#,
        dim.key_expr, dim.facts, dim.lut
    );

    let rows = sqlx::query_as::<_, (i64, String, i64, i64, i64)>(&sql)
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(date, name, hits, errors, nbytes)| HourlyPoint {
            date,
            name,
            hits,
            errors,
            nbytes,
        })
        .collect())
}

/// Top `n` keys of a dimension by `metric` over one day
///
/// `as_of` picks the day (any epoch second within it); `None` means the most
/// recent day present in the fact table.
pub async fn top_n(
    pool: &SqlitePool,
    dim: &DimensionTable,
    metric: Metric,
    as_of: Option<i64>,
    n: i64,
) -> Result<Vec<TopEntry>, StoreError> {
    let anchor = match as_of {
        Some(epoch) => epoch,
        None => match max_date(pool, dim.facts).await? {
            Some(latest) => latest,
            None => return Ok(Vec::new()),
        },
    };
    let day_start = (anchor / DAY_SECS) * DAY_SECS;

    let sql = format!(
        r#"
        SELECT {} AS name, SUM(f.{}) AS value
        FROM {} f
        JOIN {} l ON l.id = f.id
        WHERE f.date >= ? AND f.date < ?
        GROUP BY f.id
        ORDER BY value DESC
        LIMIT ?
        "#,
        dim.key_expr,
        metric.column(),
        dim.facts,
        dim.lut
    );

    let rows = sqlx::query_as::<_, (String, i64)>(&sql)
        .bind(day_start)
        .bind(day_start + DAY_SECS)
        .bind(n)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, value)| TopEntry { name, value })
        .collect())
}

/// Burst buckets over the last `hours` hours of burst data
pub async fn burst_recent(pool: &SqlitePool, hours: i64) -> Result<Vec<BurstRow>, StoreError> {
    let Some(latest) = max_date(pool, "burst").await? else {
        return Ok(Vec::new());
    };
    let cutoff = latest - hours * HOUR_BUCKET_SECS;

    let rows = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        "SELECT date, hits, errors, nbytes FROM burst WHERE date > ? ORDER BY date",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(date, hits, errors, nbytes)| BurstRow {
            date,
            hits,
            errors,
            nbytes,
        })
        .collect())
}
