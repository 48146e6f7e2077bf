//! Core domain types for boundary ingestion.
//!
//! This crate holds everything that does not touch the filesystem: boundary
//! set definitions and their registry, attribute decoding, the id/name/slug
//! extraction strategies, the geometry engine, and the store interface the
//! loader writes through.

pub mod boundary;
pub mod config;
pub mod encoding;
pub mod extract;
pub mod feature;
pub mod geometry;
pub mod registry;
pub mod store;
pub mod text;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use boundary::{Boundary, BoundarySet, SetHandle};
pub use config::{BoundarySetConfig, ConfigError, DEFAULT_SIMPLIFICATION_TOLERANCE};
pub use encoding::{TextEncoding, UnknownEncoding};
pub use extract::{ExtractError, Extracted, FeatureExtractor, Normalizer, Strategy};
pub use feature::{AttributeValue, DecodeError, Feature, RawValue};
pub use geometry::{
    CoordinateTransform, Crs, CrsError, GeoEngine, GeometryEngine, GeometryError, geometry_kind,
};
pub use registry::Registry;
pub use store::{BoundaryStore, BoundaryStoreTransaction};
