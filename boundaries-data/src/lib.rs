//! Filesystem-facing ingestion for boundary sets.
//!
//! Responsibilities:
//! - Discover TOML boundary set definitions under a data directory.
//! - Resolve configured paths into shapefiles, unpacking zip archives into
//!   scratch directories.
//! - Read shapefile geometry and attribute tables.
//! - Drive each set through the load state machine into a store.
//! - Persist boundaries in SQLite.
//!
//! Boundaries:
//! - Extraction rules and geometry normalization live in `boundaries-core`.
//!
//! Invariants:
//! - A set is replaced in one transaction or not at all.
//! - Scratch directories never outlive the load that created them.

pub mod archive;
pub mod definitions;
pub mod loader;
pub mod shapefile;
#[cfg(feature = "store-sqlite")]
pub mod store;
#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use archive::{ArchiveError, ArchiveResolver, Resolution};
pub use definitions::{DefinitionError, discover, discover_into};
pub use loader::{
    BoundarySetLoader, LoadError, LoadOptions, LoadOutcome, LoadReport, LoadState, LoadStatus,
};
pub use shapefile::{DataSource, Layer, RawFeature, ShapefileError};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteBoundaryStore, SqliteStoreError};
