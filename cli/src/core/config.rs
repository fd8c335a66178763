//! Application configuration
//!
//! Precedence: built-in defaults < config file < environment/CLI.
//! The config file is JSON, by default `agslog.json` in the data directory.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_BURST_RETENTION_DAYS, DEFAULT_IP_RETENTION_DAYS,
    DEFAULT_MAX_RAW_RECORDS, DEFAULT_REFERER_RETENTION_DAYS, DEFAULT_SERVICE_RETENTION_DAYS,
    DEFAULT_USER_AGENT_RETENTION_DAYS,
};
use super::storage::AppStorage;
use crate::utils::file::expand_path;

/// ArcGIS server deployment a command operates on.
///
/// Selects the URL-matching pattern, the catalog host, and the per-project
/// database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Project {
    Idpgis,
    Nowcoast,
}

impl Project {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Project::Idpgis => "idpgis",
            Project::Nowcoast => "nowcoast",
        }
    }

    /// Host alias the CDN prefixes onto proxied request paths
    pub fn akadns_host(&self) -> String {
        format!("{}.ncep.noaa.gov.akadns.net", self.as_str())
    }

    /// Root URL of the public services catalog
    pub fn default_catalog_root(&self) -> String {
        format!("https://{}.ncep.noaa.gov/arcgis/rest/services", self.as_str())
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ingestion settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Ceiling on buffered records before a forced flush
    pub max_raw_records: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_raw_records: DEFAULT_MAX_RAW_RECORDS,
        }
    }
}

/// Retention windows in days, per dimension
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub service_days: u32,
    pub ip_days: u32,
    pub referer_days: u32,
    pub user_agent_days: u32,
    pub burst_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            service_days: DEFAULT_SERVICE_RETENTION_DAYS,
            ip_days: DEFAULT_IP_RETENTION_DAYS,
            referer_days: DEFAULT_REFERER_RETENTION_DAYS,
            user_agent_days: DEFAULT_USER_AGENT_RETENTION_DAYS,
            burst_days: DEFAULT_BURST_RETENTION_DAYS,
        }
    }
}

/// Service catalog settings
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    /// Overrides the per-project catalog root URL when set
    pub base_url: Option<String>,
}

/// Resolved application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub retention: RetentionConfig,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from the config file (if any) over defaults.
    ///
    /// An explicitly passed `--config` path must exist; the default path in
    /// the data directory is optional.
    pub fn load(cli: &CliConfig, storage: &AppStorage) -> Result<Self> {
        let mut config = Self::default();

        let path = match &cli.config {
            Some(p) => Some(expand_path(p)),
            None => {
                let default_path = storage.data_path(CONFIG_FILE_NAME);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = path {
            let file = FileConfig::load_from_file(&path)?;
            file.warn_unknown_fields();
            config.apply_file(file);
        }

        Ok(config)
    }

    /// Fold file values over the current configuration
    fn apply_file(&mut self, file: FileConfig) {
        if let Some(ingest) = file.ingest {
            if let Some(max) = ingest.max_raw_records {
                self.ingest.max_raw_records = max;
            }
        }
        if let Some(retention) = file.retention {
            if let Some(days) = retention.service_days {
                self.retention.service_days = days;
            }
            if let Some(days) = retention.ip_days {
                self.retention.ip_days = days;
            }
            if let Some(days) = retention.referer_days {
                self.retention.referer_days = days;
            }
            if let Some(days) = retention.user_agent_days {
                self.retention.user_agent_days = days;
            }
            if let Some(days) = retention.burst_days {
                self.retention.burst_days = days;
            }
        }
        if let Some(catalog) = file.catalog {
            if catalog.base_url.is_some() {
                self.catalog.base_url = catalog.base_url;
            }
        }
    }
}

/// Raw config file contents (all fields optional)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub ingest: Option<IngestFileConfig>,
    pub retention: Option<RetentionFileConfig>,
    pub catalog: Option<CatalogFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestFileConfig {
    pub max_raw_records: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetentionFileConfig {
    pub service_days: Option<u32>,
    pub ip_days: Option<u32>,
    pub referer_days: Option<u32>,
    pub user_agent_days: Option<u32>,
    pub burst_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFileConfig {
    pub base_url: Option<String>,
}

impl FileConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}
