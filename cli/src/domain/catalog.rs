//! ArcGIS service catalog
//!
//! The server publishes its folder/service listing as JSON: one root document
//! naming the folders, then one document per folder naming the services
//! inside. Syncing reconciles `service_lut` against that listing: published
//! tuples are inserted or reactivated with `active = 1`, tuples that
//! disappeared are flipped to `active = 0`. Nothing is deleted here; retired
//! rows keep their id so historical facts stay joinable.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::core::config::Project;
use crate::core::constants::CATALOG_TIMEOUT_SECS;
use crate::data::StoreError;
use crate::data::repositories::lookup;
use crate::data::types::ServiceKey;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Root catalog document
#[derive(Debug, Deserialize)]
struct RootListing {
    folders: Vec<String>,
}

/// Per-folder catalog document
#[derive(Debug, Deserialize)]
struct FolderListing {
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    /// Qualified name, usually "Folder/Service"
    name: String,
    #[serde(rename = "type")]
    service_type: String,
}

impl ServiceEntry {
    /// The service is the last segment of the qualified name; a bare name
    /// falls back to the enclosing folder.
    fn key(&self, folder: &str) -> ServiceKey {
        match self.name.rsplit_once('/') {
            Some((prefix, service)) => ServiceKey::new(prefix, service, &self.service_type),
            None => ServiceKey::new(folder, &self.name, &self.service_type),
        }
    }
}

/// HTTP client for the published services catalog
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Build a client for one project's catalog; `base_url` overrides the
    /// project default when set.
    pub fn new(project: Project, base_url: Option<&str>) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CATALOG_TIMEOUT_SECS))
            .user_agent(concat!("agslog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url
            .map(str::to_string)
            .unwrap_or_else(|| project.default_catalog_root());

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every published service tuple, one request per folder
    pub async fn fetch_services(&self) -> Result<Vec<ServiceKey>, CatalogError> {
        let root: RootListing = self.get_json(&self.base_url).await?;
        tracing::debug!(folders = root.folders.len(), "Fetched catalog root");

        let mut keys = Vec::new();
        for folder in &root.folders {
            let url = format!("{}/{}", self.base_url, folder);
            let listing: FolderListing = self.get_json(&url).await?;
            tracing::debug!(
                folder = %folder,
                services = listing.services.len(),
                "Fetched catalog folder"
            );
            keys.extend(listing.services.iter().map(|entry| entry.key(folder)));
        }

        Ok(keys)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let response = self
            .http_client
            .get(url)
            .query(&[("f", "json")])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Changes between the store's active set and a fetched catalog
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CatalogDiff {
    pub added: Vec<ServiceKey>,
    pub retired: Vec<ServiceKey>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.retired.is_empty()
    }
}

/// Diff a fetched catalog against the currently active tuples
pub fn diff_catalog(active: &[ServiceKey], fetched: &[ServiceKey]) -> CatalogDiff {
    let active: BTreeSet<&ServiceKey> = active.iter().collect();
    let fetched: BTreeSet<&ServiceKey> = fetched.iter().collect();

    CatalogDiff {
        added: fetched
            .difference(&active)
            .map(|key| (*key).clone())
            .collect(),
        retired: active
            .difference(&fetched)
            .map(|key| (*key).clone())
            .collect(),
    }
}

/// Changes a sync would apply, without writing anything
pub async fn pending_changes(
    pool: &SqlitePool,
    fetched: &[ServiceKey],
) -> Result<CatalogDiff, CatalogError> {
    let active = lookup::active_service_keys(pool).await?;
    Ok(diff_catalog(&active, fetched))
}

/// Reconcile `service_lut` with a fetched catalog
///
/// Upserts every fetched tuple as active, deactivates the retired ones, and
/// returns the diff that was applied.
pub async fn sync_catalog(
    pool: &SqlitePool,
    fetched: &[ServiceKey],
) -> Result<CatalogDiff, CatalogError> {
    let diff = pending_changes(pool, fetched).await?;

    lookup::upsert_services_active(pool, fetched).await?;
    lookup::deactivate_services(pool, &diff.retired).await?;

    for key in &diff.added {
        tracing::info!(service = %key, "New catalog service");
    }
    for key in &diff.retired {
        tracing::info!(service = %key, "Deactivating retired catalog service");
    }

    Ok(diff)
}
