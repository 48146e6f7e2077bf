//! Persisted boundary sets and boundaries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use geo::{Contains, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BoundarySetConfig, Crs};

/// Opaque reference to a set created inside a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetHandle(i64);

impl SetHandle {
    /// Wrap a store-specific identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The store-specific identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        self.0
    }
}

/// A stored boundary set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySet {
    /// URL-safe identifier derived from `name`.
    pub slug: String,
    /// Plural label.
    pub name: String,
    /// Singular label.
    pub singular: String,
    /// Body responsible for the boundaries.
    pub authority: String,
    /// Area covered by the set.
    pub domain: String,
    /// Date the source data was last updated.
    pub last_updated: Option<NaiveDate>,
    /// Where the data was obtained.
    pub source_url: Option<String>,
    /// Licence under which the data is published.
    pub licence_url: Option<String>,
    /// Direct download location of the data.
    pub data_url: Option<String>,
    /// Free-form notes.
    pub notes: String,
    /// Extra metadata from the definition.
    pub extra: BTreeMap<String, String>,
    /// Number of stored boundaries, counted after insertion.
    pub count: u64,
    /// Attribute names seen while loading, in first-seen order.
    pub metadata_fields: Vec<String>,
}

impl BoundarySet {
    /// Descriptive fields of a set about to be created from `config`.
    #[must_use]
    pub fn from_config(config: &BoundarySetConfig) -> Self {
        Self {
            slug: config.slug(),
            name: config.name.clone(),
            singular: config.singular(),
            authority: config.authority.clone(),
            domain: config.domain.clone(),
            last_updated: config.last_updated,
            source_url: config.source_url.clone(),
            licence_url: config.licence_url.clone(),
            data_url: config.data_url.clone(),
            notes: config.notes.clone(),
            extra: config.extra.clone(),
            count: 0,
            metadata_fields: Vec::new(),
        }
    }
}

/// A stored boundary with full and simplified geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Boundary {
    /// Slug of the owning set.
    pub set_slug: String,
    /// Singular label of the owning set.
    pub set_name: String,
    /// URL-safe identifier, unique within the set.
    pub slug: String,
    /// Identifier from the source data.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Source attributes keyed by field name.
    pub metadata: Map<String, Value>,
    /// Full-resolution geometry.
    pub shape: MultiPolygon<f64>,
    /// Simplified geometry.
    pub simple_shape: MultiPolygon<f64>,
    /// Centroid of `shape`.
    pub centroid: Point<f64>,
    /// Bounding box of `shape`.
    pub extent: Option<Rect<f64>>,
    /// Coordinate system of every geometry above.
    pub crs: Crs,
}

impl Boundary {
    /// Whether `point` lies inside the full-resolution shape.
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.extent.is_some_and(|extent| extent.contains(point)) && self.shape.contains(point)
    }
}
