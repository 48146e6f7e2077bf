//! Boundary set definitions as read from definition files.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::{Strategy, StrategyError};
use crate::text::slugify;
use crate::{Crs, TextEncoding};

/// Simplification tolerance in degrees used when a definition omits one.
pub const DEFAULT_SIMPLIFICATION_TOLERANCE: f64 = 0.0002;

const fn default_tolerance() -> f64 {
    DEFAULT_SIMPLIFICATION_TOLERANCE
}

/// Configuration of one boundary set.
///
/// ```
/// use boundaries_core::{BoundarySetConfig, extract::clean_attr};
///
/// let config = BoundarySetConfig::new("Wards", "wards.zip", clean_attr("NAME"));
/// assert_eq!(config.singular(), "Ward");
/// assert_eq!(config.slug(), "wards");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundarySetConfig {
    /// Plural label; the registry key.
    pub name: String,
    /// Singular label; derived from `name` when absent.
    #[serde(default)]
    pub singular: Option<String>,
    /// Zip archive, shapefile or directory holding the source data.
    pub file: Utf8PathBuf,
    /// Body responsible for the boundaries.
    #[serde(default)]
    pub authority: String,
    /// Area covered by the set.
    #[serde(default)]
    pub domain: String,
    /// Date the source data was last updated.
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
    /// Where the data was obtained.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Licence under which the data is published.
    #[serde(default)]
    pub licence_url: Option<String>,
    /// Direct download location of the data.
    #[serde(default)]
    pub data_url: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Encoding of text attributes.
    #[serde(default)]
    pub encoding: TextEncoding,
    /// Overrides the projection read from the `.prj` file.
    #[serde(default)]
    pub crs: Option<Crs>,
    /// Simplification tolerance in target units.
    #[serde(default = "default_tolerance")]
    pub simplification_tolerance: f64,
    /// Derives the external identifier; an empty string by default.
    #[serde(default)]
    pub id_func: Strategy,
    /// Derives the display name.
    pub name_func: Strategy,
    /// Derives the slug; the name strategy by default.
    #[serde(default)]
    pub slug_func: Option<Strategy>,
    /// Extra metadata carried onto the stored set.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Errors raised when a configuration is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The set has no name.
    #[error("boundary set name must not be blank")]
    BlankName,
    /// The name contains nothing a slug can be built from.
    #[error("boundary set name {name:?} yields an empty slug")]
    UnsluggableName {
        /// Offending name.
        name: String,
    },
    /// No source file was given.
    #[error("boundary set {name:?} has no source file")]
    MissingFile {
        /// Boundary set name.
        name: String,
    },
    /// The tolerance is negative or not finite.
    #[error("boundary set {name:?} has invalid simplification tolerance {tolerance}")]
    InvalidTolerance {
        /// Boundary set name.
        name: String,
        /// Rejected tolerance.
        tolerance: f64,
    },
    /// One of the extraction strategies is unusable.
    #[error("boundary set {name:?} has an invalid {role}")]
    InvalidStrategy {
        /// Boundary set name.
        name: String,
        /// Which strategy: `id_func`, `name_func` or `slug_func`.
        role: &'static str,
        /// Why the strategy was rejected.
        #[source]
        source: StrategyError,
    },
}

impl BoundarySetConfig {
    /// Create a configuration with defaults for every optional field.
    pub fn new(name: impl Into<String>, file: impl Into<Utf8PathBuf>, name_func: Strategy) -> Self {
        Self {
            name: name.into(),
            singular: None,
            file: file.into(),
            authority: String::new(),
            domain: String::new(),
            last_updated: None,
            source_url: None,
            licence_url: None,
            data_url: None,
            notes: String::new(),
            encoding: TextEncoding::default(),
            crs: None,
            simplification_tolerance: DEFAULT_SIMPLIFICATION_TOLERANCE,
            id_func: Strategy::default(),
            name_func,
            slug_func: None,
            extra: BTreeMap::new(),
        }
    }

    /// Singular label, falling back to `name` minus one trailing `s`.
    #[must_use]
    pub fn singular(&self) -> String {
        self.singular.clone().unwrap_or_else(|| {
            self.name
                .strip_suffix('s')
                .unwrap_or(&self.name)
                .to_owned()
        })
    }

    /// Slug of the set, derived from its name.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Strategy used for slugs: `slug_func` or else `name_func`.
    #[must_use]
    pub fn slug_strategy(&self) -> &Strategy {
        self.slug_func.as_ref().unwrap_or(&self.name_func)
    }

    /// Check every field that could make a load fail before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::BlankName);
        }
        if self.slug().is_empty() {
            return Err(ConfigError::UnsluggableName {
                name: self.name.clone(),
            });
        }
        if self.file.as_str().trim().is_empty() {
            return Err(ConfigError::MissingFile {
                name: self.name.clone(),
            });
        }
        if !self.simplification_tolerance.is_finite() || self.simplification_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance {
                name: self.name.clone(),
                tolerance: self.simplification_tolerance,
            });
        }
        let strategies = [
            ("id_func", Some(&self.id_func)),
            ("name_func", Some(&self.name_func)),
            ("slug_func", self.slug_func.as_ref()),
        ];
        for (role, strategy) in strategies {
            if let Some(strategy) = strategy {
                strategy
                    .validate()
                    .map_err(|source| ConfigError::InvalidStrategy {
                        name: self.name.clone(),
                        role,
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Normalizer, attr, clean_attr};
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> BoundarySetConfig {
        BoundarySetConfig::new("Test Districts", "districts.zip", clean_attr("NAME"))
    }

    #[rstest]
    #[case("Wards", None, "Ward")]
    #[case("Census", None, "Censu")]
    #[case("Police", None, "Police")]
    #[case("Ridings", Some("Electoral riding"), "Electoral riding")]
    fn singular_defaults(#[case] name: &str, #[case] singular: Option<&str>, #[case] expected: &str) {
        let config = BoundarySetConfig {
            singular: singular.map(str::to_owned),
            ..BoundarySetConfig::new(name, "x.zip", attr("NAME"))
        };
        assert_eq!(config.singular(), expected);
    }

    #[rstest]
    fn slug_strategy_defaults_to_name(config: BoundarySetConfig) {
        assert_eq!(config.slug_strategy(), &clean_attr("NAME"));
        let custom = BoundarySetConfig {
            slug_func: Some(attr("CODE")),
            ..config
        };
        assert_eq!(custom.slug_strategy(), &attr("CODE"));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(-0.1)]
    fn rejects_bad_tolerance(config: BoundarySetConfig, #[case] tolerance: f64) {
        let config = BoundarySetConfig {
            simplification_tolerance: tolerance,
            ..config
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTolerance { .. })
        ));
    }

    #[rstest]
    fn rejects_blank_and_unsluggable_names(config: BoundarySetConfig) {
        let blank = BoundarySetConfig {
            name: "  ".to_owned(),
            ..config.clone()
        };
        assert_eq!(blank.validate(), Err(ConfigError::BlankName));
        let symbols = BoundarySetConfig {
            name: "***".to_owned(),
            ..config
        };
        assert!(matches!(
            symbols.validate(),
            Err(ConfigError::UnsluggableName { .. })
        ));
    }

    #[rstest]
    fn rejects_empty_strategy_fields(config: BoundarySetConfig) {
        let config = BoundarySetConfig {
            id_func: Strategy::joined(Vec::<String>::new(), " ", Normalizer::None),
            ..config
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStrategy {
                role: "id_func",
                source: StrategyError::NoFields,
                ..
            })
        ));
    }
}
