use clap::{Parser, Subcommand};

use super::config::Project;
use super::constants::{ENV_CONFIG, ENV_DATA_DIR};

#[derive(Parser)]
#[command(name = "agslog")]
#[command(version, about = "ArcGIS apache log aggregation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding the per-project databases and reports
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<String>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<String>,
}

/// Parse project from CLI/env string
fn parse_project(s: &str) -> Result<Project, String> {
    match s.to_lowercase().as_str() {
        "idpgis" => Ok(Project::Idpgis),
        "nowcoast" => Ok(Project::Nowcoast),
        _ => Err(format!(
            "Invalid project '{}'. Valid options: idpgis, nowcoast",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Parse an access log and merge it into the project database
    ParseLogs {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,

        /// Input log file, gzip or plain text. Reads stdin when omitted
        #[arg(long)]
        infile: Option<String>,

        /// Re-ingest even if this file is already recorded in the ingest ledger
        #[arg(long)]
        force: bool,
    },
    /// Export the report feed consumed by the downstream renderer
    ProduceGraphics {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,

        /// Output path for the report JSON (defaults to the reports directory)
        #[arg(long)]
        out: Option<String>,
    },
    /// Delete expired fact rows and orphaned lookup rows. Requires confirmation
    PruneDatabase {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Create the project database and seed the service catalog
    Initialize {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,
    },
    /// Sync the service lookup table with the live catalog
    UpdateServices {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,
    },
    /// Report catalog additions and retirements without writing
    CheckServices {
        /// Target project
        #[arg(value_parser = parse_project)]
        project: Project,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<String>,
    pub config: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        data_dir: cli.data_dir,
        config: cli.config,
    };
    (config, cli.command)
}
