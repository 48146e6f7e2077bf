//! Strategies deriving ids, names and slugs from feature attributes.
//!
//! A definition picks one [`Strategy`] per derived value. Strategies are a
//! closed set: a fixed string, a running index, or a join over attribute
//! fields with an optional [`Normalizer`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Feature;
use crate::text::{clean_string, dashed_string, slugify, title_case};

fn default_separator() -> String {
    " ".to_owned()
}

/// Post-processing applied to a joined attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalizer {
    /// Keep the value as read.
    #[default]
    None,
    /// See [`clean_string`].
    Clean,
    /// See [`dashed_string`].
    Dashed,
    /// See [`title_case`].
    Title,
}

impl Normalizer {
    /// Apply the normalizer to `value`.
    #[must_use]
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::None => value.to_owned(),
            Self::Clean => clean_string(value),
            Self::Dashed => dashed_string(value),
            Self::Title => title_case(value),
        }
    }
}

/// How a value is derived from a feature.
///
/// In definition files the variant is selected by a `kind` key:
///
/// ```toml
/// name_func = { kind = "simple", fields = ["ENAME"], normalizer = "clean" }
/// id_func = { kind = "index", prefix = "ward-" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Strategy {
    /// Always the same string.
    Static {
        /// Value returned for every feature.
        value: String,
    },
    /// `prefix` followed by a zero-based counter.
    Index {
        /// Text placed before the counter.
        #[serde(default)]
        prefix: String,
    },
    /// Attribute values joined by `separator`, trimmed and normalized.
    Simple {
        /// Attribute names, in join order.
        fields: Vec<String>,
        /// Text placed between values.
        #[serde(default = "default_separator")]
        separator: String,
        /// Post-processing of the joined value.
        #[serde(default)]
        normalizer: Normalizer,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Self::fixed("")
    }
}

/// Raised by [`Strategy::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// A `simple` strategy lists no fields.
    #[error("simple strategy must name at least one field")]
    NoFields,
    /// A `simple` strategy lists a blank field name.
    #[error("simple strategy contains a blank field name")]
    BlankField,
}

impl Strategy {
    /// A strategy returning `value` for every feature.
    #[must_use]
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Static {
            value: value.into(),
        }
    }

    /// A counter strategy producing `prefix0`, `prefix1`, ...
    #[must_use]
    pub fn index(prefix: impl Into<String>) -> Self {
        Self::Index {
            prefix: prefix.into(),
        }
    }

    /// Join several fields with `separator` and apply `normalizer`.
    #[must_use]
    pub fn joined<I, S>(fields: I, separator: impl Into<String>, normalizer: Normalizer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Simple {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: separator.into(),
            normalizer,
        }
    }

    /// Reject strategies that can never produce a value.
    pub fn validate(&self) -> Result<(), StrategyError> {
        match self {
            Self::Simple { fields, .. } if fields.is_empty() => Err(StrategyError::NoFields),
            Self::Simple { fields, .. } if fields.iter().any(|f| f.trim().is_empty()) => {
                Err(StrategyError::BlankField)
            }
            _ => Ok(()),
        }
    }
}

/// The raw attribute value of `field`.
#[must_use]
pub fn attr(field: &str) -> Strategy {
    Strategy::joined([field], " ", Normalizer::None)
}

/// The attribute value of `field`, cleaned with [`clean_string`].
#[must_use]
pub fn clean_attr(field: &str) -> Strategy {
    Strategy::joined([field], " ", Normalizer::Clean)
}

/// The attribute value of `field`, cleaned and with hyphens as em-dashes.
#[must_use]
pub fn dashed_attr(field: &str) -> Strategy {
    Strategy::joined([field], " ", Normalizer::Dashed)
}

/// The attribute value of `field`, title-cased.
#[must_use]
pub fn title_attr(field: &str) -> Strategy {
    Strategy::joined([field], " ", Normalizer::Title)
}

/// Errors raised while deriving values from a feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Normalization left nothing usable.
    #[error("{target} normalized to an empty value from {raw:?}")]
    NormalizationFailure {
        /// Which derived value failed: `id`, `name` or `slug`.
        target: &'static str,
        /// The value before normalization.
        raw: String,
    },
}

/// Applies one strategy to successive features.
///
/// The index counter lives here, so each load of a boundary set starts
/// counting from zero.
#[derive(Debug)]
pub struct Extractor<'a> {
    strategy: &'a Strategy,
    target: &'static str,
    counter: u64,
}

impl<'a> Extractor<'a> {
    /// Create an extractor for the value named `target`.
    #[must_use]
    pub const fn new(strategy: &'a Strategy, target: &'static str) -> Self {
        Self {
            strategy,
            target,
            counter: 0,
        }
    }

    /// Derive the value for `feature`.
    pub fn extract(&mut self, feature: &Feature) -> Result<String, ExtractError> {
        match self.strategy {
            Strategy::Static { value } => Ok(value.clone()),
            Strategy::Index { prefix } => {
                let value = format!("{prefix}{}", self.counter);
                self.counter += 1;
                Ok(value)
            }
            Strategy::Simple {
                fields,
                separator,
                normalizer,
            } => {
                let joined = fields
                    .iter()
                    .map(|field| feature.get(field).map(|v| v.to_text()).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(separator);
                let raw = joined.trim();
                let normalized = normalizer.apply(raw);
                let value = normalized.trim();
                if value.is_empty() && *normalizer != Normalizer::None {
                    return Err(ExtractError::NormalizationFailure {
                        target: self.target,
                        raw: raw.to_owned(),
                    });
                }
                Ok(value.to_owned())
            }
        }
    }
}

/// The values derived for one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Identifier from the source data.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// URL-safe identifier, unique within the set.
    pub slug: String,
}

/// Derives id, name and slug for every feature of one boundary set load.
#[derive(Debug)]
pub struct FeatureExtractor<'a> {
    id: Extractor<'a>,
    name: Extractor<'a>,
    slug: Option<Extractor<'a>>,
}

impl<'a> FeatureExtractor<'a> {
    /// Build extractors for the three strategies. Without a slug strategy
    /// the slug is derived from the extracted name.
    #[must_use]
    pub fn new(id: &'a Strategy, name: &'a Strategy, slug: Option<&'a Strategy>) -> Self {
        Self {
            id: Extractor::new(id, "id"),
            name: Extractor::new(name, "name"),
            slug: slug.map(|strategy| Extractor::new(strategy, "slug")),
        }
    }

    /// Derive all values for `feature`.
    ///
    /// A slug that reduces to nothing is rejected with
    /// [`ExtractError::NormalizationFailure`].
    pub fn extract(&mut self, feature: &Feature) -> Result<Extracted, ExtractError> {
        let external_id = self.id.extract(feature)?;
        let name = self.name.extract(feature)?;
        let slug_source = match self.slug.as_mut() {
            Some(extractor) => extractor.extract(feature)?,
            None => name.clone(),
        };
        let slug = slugify(&slug_source);
        if slug.is_empty() {
            return Err(ExtractError::NormalizationFailure {
                target: "slug",
                raw: slug_source,
            });
        }
        Ok(Extracted {
            external_id,
            name,
            slug,
        })
    }
}
