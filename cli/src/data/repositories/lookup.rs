//! Lookup-table repository
//!
//! Batched natural-key -> surrogate-id resolution with insert-if-absent
//! semantics, plus the catalog-facing operations on `service_lut`. Single
//! writer assumed; ids are stable for the lifetime of a lookup row and never
//! recycled (AUTOINCREMENT).

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::core::constants::SQLITE_IN_CHUNK_SIZE;
use crate::data::StoreError;
use crate::data::repositories::DimensionTable;
use crate::data::types::ServiceKey;

/// Resolve a batch of natural keys for a string dimension
///
/// Inserts unseen names (one transaction), then re-selects the whole batch in
/// chunks. Duplicate input names are tolerated.
pub async fn resolve_names(
    pool: &SqlitePool,
    dim: &DimensionTable,
    names: &[&str],
) -> Result<HashMap<String, i64>, StoreError> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let insert_sql = format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", dim.lut);

    let mut tx = pool.begin().await?;
    for name in names {
        sqlx::query(&insert_sql).bind(*name).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    let mut ids = HashMap::with_capacity(names.len());
    for chunk in names.chunks(SQLITE_IN_CHUNK_SIZE) {
        let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT name, id FROM {} WHERE name IN ({})",
            dim.lut, placeholders
        );

        let mut query = sqlx::query_as::<_, (String, i64)>(&sql);
        for name in chunk {
            query = query.bind(*name);
        }

        for (name, id) in query.fetch_all(pool).await? {
            ids.insert(name, id);
        }
    }

    Ok(ids)
}

/// Resolve a batch of service tuples
///
/// Unseen tuples are inserted with `active = 1`; classification decides
/// nothing about retirement.
pub async fn resolve_services(
    pool: &SqlitePool,
    keys: &[ServiceKey],
) -> Result<HashMap<ServiceKey, i64>, StoreError> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let mut tx = pool.begin().await?;
    for key in keys {
        sqlx::query(
            "INSERT OR IGNORE INTO service_lut (folder, service, service_type) VALUES (?, ?, ?)",
        )
        .bind(&key.folder)
        .bind(&key.service)
        .bind(&key.service_type)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    let mut ids = HashMap::with_capacity(keys.len());
    for chunk in keys.chunks(SQLITE_IN_CHUNK_SIZE) {
        // Row-value IN over the natural key tuple
        let placeholders = chunk
            .iter()
            .map(|_| "(?, ?, ?)")
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT folder, service, service_type, id FROM service_lut \
             WHERE (folder, service, service_type) IN (VALUES {})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, (String, String, String, i64)>(&sql);
        for key in chunk {
            query = query
                .bind(&key.folder)
                .bind(&key.service)
                .bind(&key.service_type);
        }

        for (folder, service, service_type, id) in query.fetch_all(pool).await? {
            ids.insert(ServiceKey::new(folder, service, service_type), id);
        }
    }

    Ok(ids)
}

/// Insert or reactivate catalog services
///
/// Used by the catalog sync: every tuple currently published on the server is
/// upserted with `active = 1`.
pub async fn upsert_services_active(
    pool: &SqlitePool,
    keys: &[ServiceKey],
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for key in keys {
        sqlx::query(
            r#"
            INSERT INTO service_lut (folder, service, service_type, active)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(folder, service, service_type) DO UPDATE SET active = 1
            "#,
        )
        .bind(&key.folder)
        .bind(&key.service)
        .bind(&key.service_type)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Mark retired catalog services inactive
///
/// Rows are kept (historical facts still reference them); only the flag
/// changes. Returns the number of rows flipped.
pub async fn deactivate_services(
    pool: &SqlitePool,
    keys: &[ServiceKey],
) -> Result<u64, StoreError> {
    let mut flipped = 0;

    let mut tx = pool.begin().await?;
    for key in keys {
        let result = sqlx::query(
            "UPDATE service_lut SET active = 0 \
             WHERE folder = ? AND service = ? AND service_type = ? AND active = 1",
        )
        .bind(&key.folder)
        .bind(&key.service)
        .bind(&key.service_type)
        .execute(&mut *tx)
        .await?;
        flipped += result.rows_affected();
    }
    tx.commit().await?;

    Ok(flipped)
}

/// All service tuples currently marked active
pub async fn active_service_keys(pool: &SqlitePool) -> Result<Vec<ServiceKey>, StoreError> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        "SELECT folder, service, service_type FROM service_lut \
         WHERE active = 1 ORDER BY folder, service, service_type",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(folder, service, service_type)| ServiceKey::new(folder, service, service_type))
        .collect())
}
