//! Error types emitted by the boundaries CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use boundaries_data::{DefinitionError, SqliteStoreError};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors emitted by the boundaries CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// The data directory does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingDataDirectory {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A configured path exists but has the wrong kind.
    #[error("{field} path {path:?} is not a {expected}")]
    WrongPathKind {
        field: &'static str,
        path: Utf8PathBuf,
        expected: &'static str,
    },
    /// A configured path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectPath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading boundary set definitions failed.
    #[error("failed to discover boundary sets under {path:?}: {source}")]
    Discovery {
        path: Utf8PathBuf,
        #[source]
        source: Box<DefinitionError>,
    },
    /// Opening the boundary database failed.
    #[error("failed to open boundary database {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: Box<SqliteStoreError>,
    },
    /// Installing the log subscriber failed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// One or more boundary sets failed to load.
    #[error("{failed} of {attempted} boundary set(s) failed to load")]
    SetsFailed { failed: usize, attempted: usize },
}
