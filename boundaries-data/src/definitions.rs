//! Discovery of boundary set definition files.
//!
//! A definition file is a TOML document whose name ends in `definition.toml`
//! or `definitions.toml` (`wards_definition.toml` counts) holding one or
//! more `[[boundary_set]]` tables:
//!
//! ```toml
//! [[boundary_set]]
//! name = "Wards"
//! file = "wards.zip"
//! name_func = { kind = "simple", fields = ["NAME"], normalizer = "clean" }
//! ```
//!
//! Relative `file` paths are resolved against the directory holding the
//! definition.

use boundaries_core::{BoundarySetConfig, ConfigError, Registry};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

const FILE_SUFFIXES: [&str; 2] = ["definition.toml", "definitions.toml"];

/// Errors raised while discovering or parsing definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// Walking the directory tree failed.
    #[error("failed to walk definitions under {root}")]
    Walk {
        /// Root of the walk.
        root: Utf8PathBuf,
        /// Source error returned by `walkdir`.
        #[source]
        source: walkdir::Error,
    },
    /// A path under the root is not valid UTF-8.
    #[error("definition path {path:?} is not valid UTF-8")]
    NonUtf8Path {
        /// Offending path.
        path: std::path::PathBuf,
    },
    /// A definition file could not be read.
    #[error("failed to read definition {path}")]
    Read {
        /// Definition file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A definition file is not valid UTF-8 text.
    #[error("definition {path} is not valid UTF-8")]
    Encoding {
        /// Definition file.
        path: Utf8PathBuf,
        /// Source error from the UTF-8 check.
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// A definition file is not a valid definition document.
    #[error("failed to parse definition {path}")]
    Parse {
        /// Definition file.
        path: Utf8PathBuf,
        /// Source error returned by `toml`.
        #[source]
        source: toml::de::Error,
    },
    /// A boundary set in the file failed validation.
    #[error("invalid boundary set in {path}")]
    Invalid {
        /// Definition file.
        path: Utf8PathBuf,
        /// Why the set was rejected.
        #[source]
        source: ConfigError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionDocument {
    #[serde(default)]
    boundary_set: Vec<BoundarySetConfig>,
}

/// Whether `file_name` names a definition file.
#[must_use]
pub fn is_definition_file(file_name: &str) -> bool {
    FILE_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}

/// Parse one definition document. Relative `file` paths are joined onto
/// `base_dir`.
pub fn parse_definitions(
    text: &str,
    path: &Utf8Path,
    base_dir: &Utf8Path,
) -> Result<Vec<BoundarySetConfig>, DefinitionError> {
    let document: DefinitionDocument =
        toml::from_str(text).map_err(|source| DefinitionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(document
        .boundary_set
        .into_iter()
        .map(|mut config| {
            if config.file.is_relative() {
                config.file = base_dir.join(&config.file);
            }
            config
        })
        .collect())
}

/// Read and parse the definition file at `path`.
pub fn load_definition_file(path: &Utf8Path) -> Result<Vec<BoundarySetConfig>, DefinitionError> {
    let bytes = boundaries_fs::read_file(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| DefinitionError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Utf8Path::new(""));
    parse_definitions(&text, path, base_dir)
}

/// Find every definition file under `root`, sorted by file name at each
/// level of the tree.
pub fn find_definition_files(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DefinitionError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DefinitionError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|path| DefinitionError::NonUtf8Path { path })?;
        if path.file_name().is_some_and(is_definition_file) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Register every boundary set defined under `root` into `registry`.
///
/// Later definitions of the same name replace earlier ones. Returns the
/// number of sets registered.
pub fn discover_into(root: &Utf8Path, registry: &mut Registry) -> Result<usize, DefinitionError> {
    let mut registered = 0;
    for path in find_definition_files(root)? {
        let configs = load_definition_file(&path)?;
        debug!("{path} defines {} boundary set(s)", configs.len());
        for config in configs {
            registry
                .register(config)
                .map_err(|source| DefinitionError::Invalid {
                    path: path.clone(),
                    source,
                })?;
            registered += 1;
        }
    }
    info!("discovered {registered} boundary set definition(s) under {root}");
    Ok(registered)
}

/// Build a registry from every definition under `root`.
pub fn discover(root: &Utf8Path) -> Result<Registry, DefinitionError> {
    let mut registry = Registry::new();
    discover_into(root, &mut registry)?;
    Ok(registry)
}
