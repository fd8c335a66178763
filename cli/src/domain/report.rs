//! Report feed assembly
//!
//! Pulls the read-only store queries together into one JSON document for the
//! downstream renderer: daily summary, recent burst, hourly service series,
//! and top-N tables per dimension. Everything is anchored on the newest date
//! in the store rather than the wall clock, so a historical archive still
//! produces a feed.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::core::config::Project;
use crate::core::constants::{REPORT_BURST_HOURS, REPORT_TIMESERIES_DAYS, REPORT_TOP_N};
use crate::data::StoreError;
use crate::data::repositories::{IP_ADDRESS, REFERER, SERVICE, USER_AGENT, report};
use crate::data::types::{BurstRow, HourlyPoint, Metric, SummaryDay, TopEntry};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize report feed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report feed: {0}")]
    Io(#[from] std::io::Error),
}

/// The document consumed by the downstream renderer
#[derive(Debug, Serialize)]
pub struct ReportFeed {
    pub project: String,
    pub generated_at: String,
    pub summary_daily: Vec<SummaryDay>,
    pub burst: Vec<BurstRow>,
    pub service_hourly: Vec<HourlyPoint>,
    pub top_services: Vec<TopEntry>,
    pub top_ips: Vec<TopEntry>,
    pub top_referers: Vec<TopEntry>,
    pub top_user_agents: Vec<TopEntry>,
}

/// Assemble the full feed from the store
pub async fn build_feed(pool: &SqlitePool, project: Project) -> Result<ReportFeed, ReportError> {
    Ok(ReportFeed {
        project: project.as_str().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        summary_daily: report::summary_daily(pool, REPORT_TIMESERIES_DAYS).await?,
        burst: report::burst_recent(pool, REPORT_BURST_HOURS).await?,
        service_hourly: report::dimension_hourly(pool, &SERVICE, REPORT_TIMESERIES_DAYS).await?,
        top_services: report::top_n(pool, &SERVICE, Metric::Hits, None, REPORT_TOP_N).await?,
        top_ips: report::top_n(pool, &IP_ADDRESS, Metric::Hits, None, REPORT_TOP_N).await?,
        top_referers: report::top_n(pool, &REFERER, Metric::Hits, None, REPORT_TOP_N).await?,
        top_user_agents: report::top_n(pool, &USER_AGENT, Metric::Hits, None, REPORT_TOP_N).await?,
    })
}

/// Write the feed as pretty JSON, atomically (temp file, then rename)
pub async fn write_feed(feed: &ReportFeed, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(feed)?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;

    // Windows-safe atomic replace: remove destination first if exists
    #[cfg(target_os = "windows")]
    if path.exists() {
        let _ = tokio::fs::remove_file(path).await;
    }

    tokio::fs::rename(&temp_path, path).await?;
    tracing::debug!(path = %path.display(), bytes = json.len(), "Wrote report feed");
    Ok(())
}
