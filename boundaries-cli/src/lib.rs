//! Command-line interface for loading boundary sets into SQLite.
#![forbid(unsafe_code)]

mod error;

use boundaries_data::{
    BoundarySetLoader, LoadOptions, LoadOutcome, LoadReport, SqliteBoundaryStore, discover,
};
use boundaries_fs::PathKind;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

pub use error::CliError;

const ARG_DATA_DIR: &str = "data-dir";
const ARG_DATABASE: &str = "database";
const DEFAULT_DATA_DIR: &str = "data/shapefiles";
const DEFAULT_DATABASE: &str = "boundaries.db";

/// Run the boundaries CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Load(args) => {
            let config = args.into_config()?;
            init_logging(config.verbose)?;
            let summary = run_load(&config)?;
            info!(
                "loaded {} set(s) with {} boundaries; skipped {}",
                summary.loaded, summary.boundaries, summary.skipped
            );
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) -> Result<(), CliError> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(CliError::Logging)
}

fn run_load(config: &LoadConfig) -> Result<LoadSummary, CliError> {
    config.validate_paths()?;
    let registry = discover(&config.data_dir).map_err(|source| CliError::Discovery {
        path: config.data_dir.clone(),
        source: Box::new(source),
    })?;
    let mut store =
        SqliteBoundaryStore::open(&config.database).map_err(|source| CliError::OpenStore {
            path: config.database.clone(),
            source: Box::new(source),
        })?;
    let report = BoundarySetLoader::new(&registry).load_all(&mut store, &config.options);
    LoadSummary::try_from(&report)
}

#[derive(Debug, Parser)]
#[command(
    name = "boundaries",
    about = "Load administrative boundary sets from shapefiles",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load boundary sets defined under a data directory.
    Load(LoadArgs),
}

/// CLI arguments for the `load` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Discover definition files under the data directory and \
                 load each boundary set into the SQLite database. Options can \
                 come from CLI flags, configuration files, or environment \
                 variables.",
    about = "Load boundary sets into the database"
)]
#[ortho_config(prefix = "BOUNDARIES")]
struct LoadArgs {
    /// Replace sets that are already loaded.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    reload: bool,
    /// Directory searched for boundary set definitions.
    #[arg(long = ARG_DATA_DIR, value_name = "path")]
    #[serde(default)]
    data_dir: Option<Utf8PathBuf>,
    /// Comma-separated set names to load; all sets when omitted.
    #[arg(long, value_name = "names")]
    #[serde(default)]
    only: Option<String>,
    /// Comma-separated set names to leave out.
    #[arg(long, value_name = "names")]
    #[serde(default)]
    except: Option<String>,
    /// SQLite database receiving the boundaries.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    database: Option<Utf8PathBuf>,
    /// Log each load step.
    #[arg(long, short)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    verbose: bool,
}

impl LoadArgs {
    fn into_config(self) -> Result<LoadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(LoadConfig::from(merged))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadConfig {
    data_dir: Utf8PathBuf,
    database: Utf8PathBuf,
    options: LoadOptions,
    verbose: bool,
}

impl LoadConfig {
    fn validate_paths(&self) -> Result<(), CliError> {
        match Self::inspect(&self.data_dir, ARG_DATA_DIR)? {
            PathKind::Directory => {}
            PathKind::Missing => {
                return Err(CliError::MissingDataDirectory {
                    field: ARG_DATA_DIR,
                    path: self.data_dir.clone(),
                });
            }
            PathKind::File | PathKind::Other => {
                return Err(CliError::WrongPathKind {
                    field: ARG_DATA_DIR,
                    path: self.data_dir.clone(),
                    expected: "directory",
                });
            }
        }
        match Self::inspect(&self.database, ARG_DATABASE)? {
            PathKind::File | PathKind::Missing => Ok(()),
            PathKind::Directory | PathKind::Other => Err(CliError::WrongPathKind {
                field: ARG_DATABASE,
                path: self.database.clone(),
                expected: "file",
            }),
        }
    }

    fn inspect(path: &Utf8Path, field: &'static str) -> Result<PathKind, CliError> {
        boundaries_fs::path_kind(path).map_err(|source| CliError::InspectPath {
            field,
            path: path.to_path_buf(),
            source,
        })
    }
}

impl From<LoadArgs> for LoadConfig {
    fn from(args: LoadArgs) -> Self {
        let list = |value: Option<String>| {
            value
                .as_deref()
                .map(LoadOptions::parse_list)
                .unwrap_or_default()
        };
        Self {
            data_dir: args
                .data_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_DIR)),
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            options: LoadOptions {
                reload: args.reload,
                only: list(args.only),
                except: list(args.except),
            },
            verbose: args.verbose,
        }
    }
}

/// Totals of a batch load in which no set failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LoadSummary {
    loaded: usize,
    skipped: usize,
    boundaries: u64,
}

impl TryFrom<&LoadReport> for LoadSummary {
    type Error = CliError;

    fn try_from(report: &LoadReport) -> Result<Self, Self::Error> {
        if report.is_empty() {
            warn!("no boundary sets were selected");
        }
        let mut summary = Self {
            boundaries: report.loaded_boundaries(),
            ..Self::default()
        };
        let mut failed = 0;
        for (name, outcome) in report.iter() {
            match outcome {
                LoadOutcome::Loaded { count } => {
                    info!("{name}: loaded {count} boundaries");
                    summary.loaded += 1;
                }
                LoadOutcome::Skipped => {
                    info!("{name}: already loaded");
                    summary.skipped += 1;
                }
                LoadOutcome::Failed(err) => {
                    warn!("{name}: failed ({err})");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(CliError::SetsFailed {
                failed,
                attempted: report.len(),
            });
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests;
