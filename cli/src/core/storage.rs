//! Platform-aware data storage directory management
//!
//! ## Platform Paths
//!
//! | Type | Windows | macOS | Linux |
//! |------|---------|-------|-------|
//! | Data | `%APPDATA%\AgsLog\` | `~/Library/Application Support/AgsLog/` | `$XDG_DATA_HOME/agslog/` |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::config::Project;
use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR};
use crate::utils::file::expand_path;

/// Data subdirectories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubdir {
    Sqlite,
    Reports,
}

impl DataSubdir {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataSubdir::Sqlite => "sqlite",
            DataSubdir::Reports => "reports",
        }
    }

    /// Returns all subdirectories created at startup.
    pub const fn all() -> &'static [DataSubdir] {
        &[DataSubdir::Sqlite, DataSubdir::Reports]
    }
}

/// Application storage manager
#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
}

impl AppStorage {
    /// Initialize storage with platform-appropriate data directory
    pub async fn init(data_dir_arg: Option<&str>) -> Result<Self> {
        let data_dir = Self::resolve_data_dir(data_dir_arg);

        // Create directories first (canonicalize requires path to exist)
        Self::ensure_directories_static(&data_dir).await?;

        // Now canonicalize to get clean path for logging
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        tracing::debug!(data_dir = %data_dir.display(), "Storage initialized");

        Ok(Self { data_dir })
    }

    /// Resolve data directory from CLI/env override or platform default
    pub fn resolve_data_dir(data_dir_arg: Option<&str>) -> PathBuf {
        // CLI argument carries the env var too (clap env fallback)
        if let Some(dir) = data_dir_arg {
            return expand_path(dir);
        }

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return expand_path(&dir);
        }

        // Use platform-specific directory
        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            return proj_dirs.data_dir().to_path_buf();
        }

        // Fallback to local .agslog
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(APP_DOT_FOLDER)
    }

    /// Create data directory and subdirectories
    async fn ensure_directories_static(data_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        for subdir in DataSubdir::all() {
            let path = data_dir.join(subdir.as_str());
            tokio::fs::create_dir_all(&path).await.with_context(|| {
                format!(
                    "Failed to create {} directory: {}",
                    subdir.as_str(),
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to a file within the data directory
    pub fn data_path(&self, filename: &str) -> PathBuf {
        self.data_dir.join(filename)
    }

    /// Get path to a file within a subdirectory
    pub fn subdir_path(&self, subdir: DataSubdir, filename: &str) -> PathBuf {
        self.data_dir.join(subdir.as_str()).join(filename)
    }

    /// Path of a project's SQLite database file
    pub fn sqlite_db_path(&self, project: Project) -> PathBuf {
        self.subdir_path(DataSubdir::Sqlite, &format!("{}.db", project.as_str()))
    }

    /// Default output path of a project's report feed JSON
    pub fn report_path(&self, project: Project) -> PathBuf {
        self.subdir_path(
            DataSubdir::Reports,
            &format!("{}_report.json", project.as_str()),
        )
    }

    /// Create AppStorage for testing with a specific data directory
    #[cfg(test)]
    pub fn init_for_test(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_subdir_as_str() {
        assert_eq!(DataSubdir::Sqlite.as_str(), "sqlite");
        assert_eq!(DataSubdir::Reports.as_str(), "reports");
    }

    #[test]
    fn test_data_subdir_all() {
        let all = DataSubdir::all();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&DataSubdir::Sqlite));
        assert!(all.contains(&DataSubdir::Reports));
    }

    #[test]
    fn test_resolve_data_dir_arg_wins() {
        let path = AppStorage::resolve_data_dir(Some("/tmp/agslog-test"));
        assert_eq!(path, PathBuf::from("/tmp/agslog-test"));
    }

    #[test]
    fn test_resolve_data_dir_fallback() {
        // Without env var set, should return a non-empty path
        // SAFETY: Test runs single-threaded, no concurrent access to env var
        unsafe { std::env::remove_var(ENV_DATA_DIR) };
        let path = AppStorage::resolve_data_dir(None);
        assert!(!path.as_os_str().is_empty());
    }

    #[test]
    fn test_project_paths() {
        let storage = AppStorage::init_for_test(PathBuf::from("/data"));
        assert_eq!(
            storage.sqlite_db_path(Project::Idpgis),
            PathBuf::from("/data/sqlite/idpgis.db")
        );
        assert_eq!(
            storage.report_path(Project::Nowcoast),
            PathBuf::from("/data/reports/nowcoast_report.json")
        );
        assert_eq!(storage.data_path("agslog.json"), PathBuf::from("/data/agslog.json"));
    }
}
