//! Persistence interface for boundary sets.
//!
//! Writes go through a [`BoundaryStoreTransaction`] so a whole set is
//! replaced atomically. Dropping a transaction without calling
//! [`BoundaryStoreTransaction::commit`] discards every change made through
//! it.

use geo::Point;

use crate::{Boundary, BoundarySet, Crs, SetHandle};

/// A store holding boundary sets and their boundaries.
pub trait BoundaryStore {
    /// Error type raised by every store operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Transaction type returned by [`BoundaryStore::begin`].
    type Transaction<'a>: BoundaryStoreTransaction<Error = Self::Error>
    where
        Self: 'a;

    /// Coordinate system stored geometries must be in.
    fn target_crs(&self) -> Crs;

    /// Whether a set named `name` has been committed.
    fn set_exists(&self, name: &str) -> Result<bool, Self::Error>;

    /// Start a write transaction.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, Self::Error>;

    /// The set with `slug`.
    fn boundary_set(&self, slug: &str) -> Result<Option<BoundarySet>, Self::Error>;

    /// All sets, ordered by slug.
    fn boundary_sets(&self) -> Result<Vec<BoundarySet>, Self::Error>;

    /// Boundaries of the set with `set_slug`, ordered by slug.
    fn boundaries(&self, set_slug: &str) -> Result<Vec<Boundary>, Self::Error>;

    /// One boundary of a set.
    fn boundary(&self, set_slug: &str, slug: &str) -> Result<Option<Boundary>, Self::Error>;

    /// Boundaries, across all sets, whose shape contains `point`.
    fn boundaries_containing(&self, point: Point<f64>) -> Result<Vec<Boundary>, Self::Error>;
}

/// Write operations scoped to one transaction.
pub trait BoundaryStoreTransaction {
    /// Error type raised by every operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Delete the set named `name` and, through cascade, its boundaries.
    /// Returns whether a set was deleted.
    fn delete_set_by_name(&mut self, name: &str) -> Result<bool, Self::Error>;

    /// Create a set from its descriptive fields.
    fn create_set(&mut self, set: &BoundarySet) -> Result<SetHandle, Self::Error>;

    /// Insert boundaries into a set created in this transaction.
    fn bulk_create_boundaries(
        &mut self,
        set: SetHandle,
        boundaries: &[Boundary],
    ) -> Result<(), Self::Error>;

    /// Number of boundaries stored for the set.
    fn count_boundaries(&self, set: SetHandle) -> Result<u64, Self::Error>;

    /// Record the final boundary count on the set.
    fn finalize_count(&mut self, set: SetHandle, count: u64) -> Result<(), Self::Error>;

    /// Make every change visible.
    fn commit(self) -> Result<(), Self::Error>;
}
