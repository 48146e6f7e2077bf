//! Facade crate for boundary set ingestion.
//!
//! This crate re-exports the core domain types and exposes the filesystem
//! loader and the SQLite store behind feature flags.

#![forbid(unsafe_code)]

pub use boundaries_core::{
    Boundary, BoundarySet, BoundarySetConfig, BoundaryStore, BoundaryStoreTransaction, Crs,
    ExtractError, FeatureExtractor, GeoEngine, GeometryEngine, GeometryError, Normalizer,
    Registry, SetHandle, Strategy, TextEncoding,
};

#[cfg(feature = "data")]
pub use boundaries_data::{
    ArchiveResolver, BoundarySetLoader, DefinitionError, LoadError, LoadOptions, LoadOutcome,
    LoadReport, LoadState, LoadStatus, discover,
};

#[cfg(feature = "store-sqlite")]
pub use boundaries_data::{SqliteBoundaryStore, SqliteStoreError};
