//! Core application

use anyhow::{Context, Result};

use crate::core::cli::{self, Commands};
use crate::core::config::{AppConfig, Project};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::data::repositories::ingest as ledger;
use crate::data::retention;
use crate::domain::catalog::{self, CatalogClient, CatalogDiff};
use crate::domain::ingest::{self, LogPipeline};
use crate::domain::report;
use crate::utils::crypto::sha256_file_hex;
use crate::utils::file::expand_path;

pub struct CoreApp;

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let storage = AppStorage::init(cli_config.data_dir.as_deref()).await?;
        let config = AppConfig::load(&cli_config, &storage)?;

        match command {
            Commands::ParseLogs {
                project,
                infile,
                force,
            } => Self::parse_logs(&storage, &config, project, infile.as_deref(), force).await,
            Commands::ProduceGraphics { project, out } => {
                Self::produce_graphics(&storage, project, out.as_deref()).await
            }
            Commands::PruneDatabase { project, yes } => {
                Self::prune_database(&storage, &config, project, yes).await
            }
            Commands::Initialize { project } => Self::initialize(&storage, &config, project).await,
            Commands::UpdateServices { project } => {
                Self::sync_services(&storage, &config, project, false).await
            }
            Commands::CheckServices { project } => {
                Self::sync_services(&storage, &config, project, true).await
            }
        }
    }

    /// Ingest one log source into the project store
    async fn parse_logs(
        storage: &AppStorage,
        config: &AppConfig,
        project: Project,
        infile: Option<&str>,
        force: bool,
    ) -> Result<()> {
        // Hash the file up front: the digest keys the ingest ledger, and a
        // missing file fails before the database is touched
        let source = match infile {
            Some(raw) => {
                let path = expand_path(raw);
                let digest = sha256_file_hex(&path)
                    .with_context(|| format!("Failed to read log file: {}", path.display()))?;
                Some((path, digest))
            }
            None => None,
        };

        let sqlite = SqliteService::init(storage, project)
            .await
            .with_context(|| format!("Failed to open database for {}", project))?;
        let pool = sqlite.pool();

        if let Some((path, digest)) = &source
            && ledger::is_ingested(pool, digest).await?
        {
            if force {
                tracing::info!(file = %path.display(), "Already ingested, forcing re-ingest");
            } else {
                tracing::warn!(
                    file = %path.display(),
                    "Already ingested, skipping (use --force to re-ingest)"
                );
                sqlite.close().await;
                return Ok(());
            }
        }

        let reader = match &source {
            Some((path, _)) => ingest::open_log_file(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?,
            None => ingest::stdin_reader().context("Failed to open stdin")?,
        };

        let pipeline = LogPipeline::new(project, config.ingest.max_raw_records);
        let report = pipeline.run(pool, reader).await?;

        if let Some((path, digest)) = &source {
            ledger::record_ingest(
                pool,
                &path.display().to_string(),
                digest,
                report.lines_read as i64,
            )
            .await?;
        }

        tracing::info!(
            project = %project,
            lines_read = report.lines_read,
            parsed = report.parsed,
            rejected = report.rejected,
            ip_rows = report.merged.ip_address,
            referer_rows = report.merged.referer,
            user_agent_rows = report.merged.user_agent,
            service_rows = report.merged.service,
            summary_rows = report.merged.summary,
            burst_rows = report.merged.burst,
            "Ingest complete"
        );

        sqlite.close().await;
        Ok(())
    }

    /// Export the report feed JSON for the downstream renderer
    async fn produce_graphics(
        storage: &AppStorage,
        project: Project,
        out: Option<&str>,
    ) -> Result<()> {
        let sqlite = SqliteService::init(storage, project)
            .await
            .with_context(|| format!("Failed to open database for {}", project))?;

        let feed = report::build_feed(sqlite.pool(), project).await?;
        sqlite.close().await;

        let out_path = match out {
            Some(raw) => expand_path(raw),
            None => storage.report_path(project),
        };
        report::write_feed(&feed, &out_path)
            .await
            .with_context(|| format!("Failed to write report feed: {}", out_path.display()))?;

        println!("Report feed written: {}", out_path.display());
        Ok(())
    }

    /// Delete expired rows per the configured retention windows
    async fn prune_database(
        storage: &AppStorage,
        config: &AppConfig,
        project: Project,
        skip_confirm: bool,
    ) -> Result<()> {
        let db_path = storage.sqlite_db_path(project);
        if !db_path.exists() {
            println!(
                "Nothing to prune. Database does not exist: {}",
                db_path.display()
            );
            return Ok(());
        }

        println!("This will permanently delete rows older than the retention windows:");
        println!("  service:    {} days", config.retention.service_days);
        println!("  ip_address: {} days", config.retention.ip_days);
        println!("  referer:    {} days", config.retention.referer_days);
        println!("  user_agent: {} days", config.retention.user_agent_days);
        println!("  burst:      {} days", config.retention.burst_days);
        println!();
        println!("Database: {}", db_path.display());

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        let sqlite = SqliteService::init(storage, project)
            .await
            .with_context(|| format!("Failed to open database for {}", project))?;
        let result = retention::run_retention(sqlite.pool(), &config.retention).await?;
        sqlite.close().await;

        println!(
            "Pruned {} fact rows, {} lookup rows, {} burst buckets.",
            result.fact_rows, result.lookup_rows, result.burst_rows
        );
        Ok(())
    }

    /// Create/migrate the project database and seed the service catalog
    async fn initialize(storage: &AppStorage, config: &AppConfig, project: Project) -> Result<()> {
        let sqlite = SqliteService::init(storage, project)
            .await
            .with_context(|| format!("Failed to initialize database for {}", project))?;

        let client = CatalogClient::new(project, config.catalog.base_url.as_deref())?;
        let fetched = client
            .fetch_services()
            .await
            .context("Failed to fetch the service catalog")?;
        catalog::sync_catalog(sqlite.pool(), &fetched).await?;
        sqlite.close().await;

        println!(
            "Initialized {} with {} catalog services.",
            storage.sqlite_db_path(project).display(),
            fetched.len()
        );
        Ok(())
    }

    /// Reconcile `service_lut` with the live catalog; dry run only reports
    async fn sync_services(
        storage: &AppStorage,
        config: &AppConfig,
        project: Project,
        dry_run: bool,
    ) -> Result<()> {
        let sqlite = SqliteService::init(storage, project)
            .await
            .with_context(|| format!("Failed to open database for {}", project))?;
        let pool = sqlite.pool();

        let client = CatalogClient::new(project, config.catalog.base_url.as_deref())?;
        let fetched = client
            .fetch_services()
            .await
            .context("Failed to fetch the service catalog")?;

        let diff = if dry_run {
            catalog::pending_changes(pool, &fetched).await?
        } else {
            catalog::sync_catalog(pool, &fetched).await?
        };
        sqlite.close().await;

        Self::print_catalog_diff(&diff, dry_run);
        Ok(())
    }

    fn print_catalog_diff(diff: &CatalogDiff, dry_run: bool) {
        if diff.added.is_empty() {
            println!("No new services.");
        } else {
            println!("New services:");
            for key in &diff.added {
                println!("  {}", key);
            }
        }

        if diff.retired.is_empty() {
            println!("No retired services.");
        } else {
            println!("Retired services:");
            for key in &diff.retired {
                println!("  {}", key);
            }
        }

        if dry_run {
            println!("\nCheck only, nothing written.");
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
