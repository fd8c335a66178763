//! Time-bucket aggregation and merge
//!
//! One generic [`DimensionAggregator`] is instantiated per dimension, plus
//! two un-keyed instances for the summary and burst axes. Flushing resolves
//! natural keys to surrogate ids and merges the grouped sums into the store,
//! one transaction per dimension in a fixed order. The merge accumulates on
//! conflict, so flushing the same records twice doubles the stored sums.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use sqlx::SqlitePool;

use crate::core::constants::{HOUR_BUCKET_SECS, MINUTE_BUCKET_SECS};
use crate::data::StoreError;
use crate::data::repositories::{DimensionTable, IP_ADDRESS, REFERER, USER_AGENT, facts, lookup};
use crate::data::types::{BurstRow, FactRow, ServiceFactRow, ServiceKey, SummaryRow};
use crate::domain::ingest::ClassifiedRecord;
use crate::utils::time::floor_to_bucket;

/// Running sums for one (bucket, key) cell
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct BucketSums {
    hits: i64,
    errors: i64,
    nbytes: i64,
    export_mapdraws: i64,
    wms_mapdraws: i64,
}

impl BucketSums {
    fn absorb(&mut self, record: &ClassifiedRecord) {
        self.hits += 1;
        if record.is_error {
            self.errors += 1;
        }
        self.nbytes += record.nbytes;
        if let Some(service) = &record.service {
            if service.export_mapdraw {
                self.export_mapdraws += 1;
            }
            if service.wms_mapdraw {
                self.wms_mapdraws += 1;
            }
        }
    }
}

/// Groups records into (bucket_start, key) cells for one dimension
///
/// Parameterized by a key-extraction function; a `None` key means the record
/// does not participate in this dimension.
struct DimensionAggregator<K> {
    bucket_secs: i64,
    extract: fn(&ClassifiedRecord) -> Option<K>,
    buckets: HashMap<(i64, K), BucketSums>,
}

impl<K: Eq + Hash + Ord> DimensionAggregator<K> {
    fn new(bucket_secs: i64, extract: fn(&ClassifiedRecord) -> Option<K>) -> Self {
        Self {
            bucket_secs,
            extract,
            buckets: HashMap::new(),
        }
    }

    fn observe(&mut self, record: &ClassifiedRecord) {
        if let Some(key) = (self.extract)(record) {
            let bucket = floor_to_bucket(record.timestamp, self.bucket_secs);
            self.buckets.entry((bucket, key)).or_default().absorb(record);
        }
    }

    /// Drain all cells, ordered by (bucket, key)
    fn drain_sorted(&mut self) -> Vec<((i64, K), BucketSums)> {
        let mut cells: Vec<_> = self.buckets.drain().collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        cells
    }
}

/// Rows merged per axis by one flush
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushCounts {
    pub ip_address: u64,
    pub referer: u64,
    pub user_agent: u64,
    pub service: u64,
    pub summary: u64,
    pub burst: u64,
}

impl FlushCounts {
    /// Fold another flush into a running total
    pub fn accumulate(&mut self, other: &FlushCounts) {
        self.ip_address += other.ip_address;
        self.referer += other.referer;
        self.user_agent += other.user_agent;
        self.service += other.service;
        self.summary += other.summary;
        self.burst += other.burst;
    }

    pub fn total(&self) -> u64 {
        self.ip_address + self.referer + self.user_agent + self.service + self.summary + self.burst
    }
}

/// All six aggregation axes over one batch of records
pub struct BatchAggregates {
    ip_address: DimensionAggregator<String>,
    referer: DimensionAggregator<String>,
    user_agent: DimensionAggregator<String>,
    service: DimensionAggregator<ServiceKey>,
    summary: DimensionAggregator<()>,
    burst: DimensionAggregator<()>,
}

impl Default for BatchAggregates {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchAggregates {
    pub fn new() -> Self {
        Self {
            ip_address: DimensionAggregator::new(HOUR_BUCKET_SECS, |r| Some(r.ip_address.clone())),
            referer: DimensionAggregator::new(HOUR_BUCKET_SECS, |r| Some(r.referer.clone())),
            user_agent: DimensionAggregator::new(HOUR_BUCKET_SECS, |r| Some(r.user_agent.clone())),
            service: DimensionAggregator::new(HOUR_BUCKET_SECS, |r| {
                r.service.as_ref().map(|s| s.key.clone())
            }),
            summary: DimensionAggregator::new(HOUR_BUCKET_SECS, |_| Some(())),
            burst: DimensionAggregator::new(MINUTE_BUCKET_SECS, |_| Some(())),
        }
    }

    pub fn observe(&mut self, record: &ClassifiedRecord) {
        self.ip_address.observe(record);
        self.referer.observe(record);
        self.user_agent.observe(record);
        self.service.observe(record);
        self.summary.observe(record);
        self.burst.observe(record);
    }

    pub fn observe_all(&mut self, records: &[ClassifiedRecord]) {
        for record in records {
            self.observe(record);
        }
    }

    /// Merge everything into the store
    ///
    /// Fixed dimension order, one transaction each: ip_address, referer,
    /// user_agent, service, summary, burst. The first failure aborts the
    /// flush; dimensions after it are left untouched and the error
    /// propagates to terminate the run.
    pub async fn flush(&mut self, pool: &SqlitePool) -> Result<FlushCounts, StoreError> {
        let mut counts = FlushCounts::default();

        counts.ip_address = flush_string_dimension(pool, &IP_ADDRESS, &mut self.ip_address).await?;
        counts.referer = flush_string_dimension(pool, &REFERER, &mut self.referer).await?;
        counts.user_agent =
            flush_string_dimension(pool, &USER_AGENT, &mut self.user_agent).await?;
        counts.service = flush_service_dimension(pool, &mut self.service).await?;

        let summary_rows: Vec<SummaryRow> = self
            .summary
            .drain_sorted()
            .into_iter()
            .map(|((date, ()), sums)| SummaryRow {
                date,
                hits: sums.hits,
                errors: sums.errors,
                nbytes: sums.nbytes,
                mapdraws: sums.export_mapdraws + sums.wms_mapdraws,
            })
            .collect();
        counts.summary = facts::merge_summary(pool, &summary_rows).await?;

        let burst_rows: Vec<BurstRow> = self
            .burst
            .drain_sorted()
            .into_iter()
            .map(|((date, ()), sums)| BurstRow {
                date,
                hits: sums.hits,
                errors: sums.errors,
                nbytes: sums.nbytes,
            })
            .collect();
        counts.burst = facts::merge_burst(pool, &burst_rows).await?;

        Ok(counts)
    }
}

async fn flush_string_dimension(
    pool: &SqlitePool,
    dim: &DimensionTable,
    aggregator: &mut DimensionAggregator<String>,
) -> Result<u64, StoreError> {
    let cells = aggregator.drain_sorted();
    if cells.is_empty() {
        return Ok(0);
    }

    let names: Vec<&str> = cells
        .iter()
        .map(|((_, name), _)| name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ids = lookup::resolve_names(pool, dim, &names).await?;

    let mut rows = Vec::with_capacity(cells.len());
    for ((date, name), sums) in &cells {
        let id = *ids
            .get(name)
            .ok_or_else(|| StoreError::LookupMiss(name.clone()))?;
        rows.push(FactRow {
            date: *date,
            id,
            hits: sums.hits,
            errors: sums.errors,
            nbytes: sums.nbytes,
        });
    }

    facts::merge_dimension_facts(pool, dim, &rows).await
}

async fn flush_service_dimension(
    pool: &SqlitePool,
    aggregator: &mut DimensionAggregator<ServiceKey>,
) -> Result<u64, StoreError> {
    let cells = aggregator.drain_sorted();
    if cells.is_empty() {
        return Ok(0);
    }

    let keys: Vec<ServiceKey> = cells
        .iter()
        .map(|((_, key), _)| key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let ids = lookup::resolve_services(pool, &keys).await?;

    let mut rows = Vec::with_capacity(cells.len());
    for ((date, key), sums) in &cells {
        let id = *ids
            .get(key)
            .ok_or_else(|| StoreError::LookupMiss(key.to_string()))?;
        rows.push(ServiceFactRow {
            date: *date,
            id,
            hits: sums.hits,
            errors: sums.errors,
            nbytes: sums.nbytes,
            export_mapdraws: sums.export_mapdraws,
            wms_mapdraws: sums.wms_mapdraws,
        });
    }

    facts::merge_service_facts(pool, &rows).await
}
