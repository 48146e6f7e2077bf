//! Test-only, in-memory `BoundaryStore` implementation used by unit and
//! behaviour tests.

use geo::Point;
use thiserror::Error;

use crate::{Boundary, BoundarySet, BoundaryStore, BoundaryStoreTransaction, Crs, SetHandle};

/// Errors raised by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryStoreError {
    /// The handle does not refer to a set in this transaction.
    #[error("unknown set handle {id}")]
    UnknownSet {
        /// Identifier behind the handle.
        id: i64,
    },
    /// A set with the same slug already exists.
    #[error("boundary set {slug:?} already exists")]
    DuplicateSet {
        /// Conflicting set slug.
        slug: String,
    },
    /// A boundary with the same slug already exists in the set.
    #[error("boundary {slug:?} already exists in set {set_slug:?}")]
    DuplicateBoundary {
        /// Slug of the owning set.
        set_slug: String,
        /// Conflicting boundary slug.
        slug: String,
    },
    /// Inserts were configured to fail.
    #[error("boundary inserts are disabled for this store")]
    InsertsDisabled,
}

#[derive(Debug, Default, Clone)]
struct MemoryData {
    next_id: i64,
    sets: Vec<(i64, BoundarySet)>,
    boundaries: Vec<(i64, Boundary)>,
}

impl MemoryData {
    fn set_id_by_slug(&self, slug: &str) -> Option<i64> {
        self.sets
            .iter()
            .find_map(|(id, set)| (set.slug == slug).then_some(*id))
    }

    fn set_slug(&self, id: i64) -> Result<&str, MemoryStoreError> {
        self.sets
            .iter()
            .find_map(|(set_id, set)| (*set_id == id).then_some(set.slug.as_str()))
            .ok_or(MemoryStoreError::UnknownSet { id })
    }
}

/// In-memory [`BoundaryStore`] used in tests.
///
/// Transactions work on a copy of the data that replaces the committed
/// state on commit, so dropped transactions leave no trace.
#[derive(Debug)]
pub struct MemoryStore {
    data: MemoryData,
    target_crs: Crs,
    fail_inserts: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Crs::WGS84)
    }
}

impl MemoryStore {
    /// Create an empty store keeping geometries in `target_crs`.
    #[must_use]
    pub fn new(target_crs: Crs) -> Self {
        Self {
            data: MemoryData::default(),
            target_crs,
            fail_inserts: false,
        }
    }

    /// Create a store whose boundary inserts always fail.
    #[must_use]
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Self::default()
        }
    }

    /// Number of committed boundaries across all sets.
    #[must_use]
    pub fn boundary_count(&self) -> usize {
        self.data.boundaries.len()
    }
}

/// Transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    committed: &'a mut MemoryData,
    staged: MemoryData,
    fail_inserts: bool,
}

impl BoundaryStore for MemoryStore {
    type Error = MemoryStoreError;
    type Transaction<'a> = MemoryTransaction<'a>;

    fn target_crs(&self) -> Crs {
        self.target_crs.clone()
    }

    fn set_exists(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.data.sets.iter().any(|(_, set)| set.name == name))
    }

    fn begin(&mut self) -> Result<Self::Transaction<'_>, Self::Error> {
        let staged = self.data.clone();
        Ok(MemoryTransaction {
            committed: &mut self.data,
            staged,
            fail_inserts: self.fail_inserts,
        })
    }

    fn boundary_set(&self, slug: &str) -> Result<Option<BoundarySet>, Self::Error> {
        Ok(self
            .data
            .sets
            .iter()
            .find(|(_, set)| set.slug == slug)
            .map(|(_, set)| set.clone()))
    }

    fn boundary_sets(&self) -> Result<Vec<BoundarySet>, Self::Error> {
        let mut sets: Vec<_> = self.data.sets.iter().map(|(_, set)| set.clone()).collect();
        sets.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(sets)
    }

    fn boundaries(&self, set_slug: &str) -> Result<Vec<Boundary>, Self::Error> {
        let Some(set_id) = self.data.set_id_by_slug(set_slug) else {
            return Ok(Vec::new());
        };
        let mut boundaries: Vec<_> = self
            .data
            .boundaries
            .iter()
            .filter(|(id, _)| *id == set_id)
            .map(|(_, boundary)| boundary.clone())
            .collect();
        boundaries.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(boundaries)
    }

    fn boundary(&self, set_slug: &str, slug: &str) -> Result<Option<Boundary>, Self::Error> {
        Ok(self
            .boundaries(set_slug)?
            .into_iter()
            .find(|boundary| boundary.slug == slug))
    }

    fn boundaries_containing(&self, point: Point<f64>) -> Result<Vec<Boundary>, Self::Error> {
        Ok(self
            .data
            .boundaries
            .iter()
            .filter(|(_, boundary)| boundary.contains(&point))
            .map(|(_, boundary)| boundary.clone())
            .collect())
    }
}

impl BoundaryStoreTransaction for MemoryTransaction<'_> {
    type Error = MemoryStoreError;

    fn delete_set_by_name(&mut self, name: &str) -> Result<bool, Self::Error> {
        let doomed: Vec<i64> = self
            .staged
            .sets
            .iter()
            .filter(|(_, set)| set.name == name)
            .map(|(id, _)| *id)
            .collect();
        self.staged.sets.retain(|(id, _)| !doomed.contains(id));
        self.staged
            .boundaries
            .retain(|(set_id, _)| !doomed.contains(set_id));
        Ok(!doomed.is_empty())
    }

    fn create_set(&mut self, set: &BoundarySet) -> Result<SetHandle, Self::Error> {
        if self.staged.set_id_by_slug(&set.slug).is_some() {
            return Err(MemoryStoreError::DuplicateSet {
                slug: set.slug.clone(),
            });
        }
        self.staged.next_id += 1;
        let id = self.staged.next_id;
        self.staged.sets.push((id, set.clone()));
        Ok(SetHandle::new(id))
    }

    fn bulk_create_boundaries(
        &mut self,
        set: SetHandle,
        boundaries: &[Boundary],
    ) -> Result<(), Self::Error> {
        if self.fail_inserts {
            return Err(MemoryStoreError::InsertsDisabled);
        }
        let set_slug = self.staged.set_slug(set.id())?.to_owned();
        for boundary in boundaries {
            let duplicate = self
                .staged
                .boundaries
                .iter()
                .any(|(id, existing)| *id == set.id() && existing.slug == boundary.slug);
            if duplicate {
                return Err(MemoryStoreError::DuplicateBoundary {
                    set_slug,
                    slug: boundary.slug.clone(),
                });
            }
            self.staged.boundaries.push((set.id(), boundary.clone()));
        }
        Ok(())
    }

    fn count_boundaries(&self, set: SetHandle) -> Result<u64, Self::Error> {
        self.staged.set_slug(set.id())?;
        let count = self
            .staged
            .boundaries
            .iter()
            .filter(|(id, _)| *id == set.id())
            .count();
        Ok(count as u64)
    }

    fn finalize_count(&mut self, set: SetHandle, count: u64) -> Result<(), Self::Error> {
        let entry = self
            .staged
            .sets
            .iter_mut()
            .find(|(id, _)| *id == set.id())
            .ok_or(MemoryStoreError::UnknownSet { id: set.id() })?;
        entry.1.count = count;
        Ok(())
    }

    fn commit(self) -> Result<(), Self::Error> {
        *self.committed = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundarySetConfig, extract::attr};
    use geo::{MultiPolygon, point, polygon};
    use rstest::{fixture, rstest};
    use serde_json::Map;

    #[fixture]
    fn set() -> BoundarySet {
        BoundarySet::from_config(&BoundarySetConfig::new("Wards", "wards.zip", attr("NAME")))
    }

    fn boundary(slug: &str, offset: f64) -> Boundary {
        let shape = MultiPolygon::new(vec![polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
            (x: offset, y: 1.0),
            (x: offset, y: 0.0),
        ]]);
        Boundary {
            set_slug: "wards".to_owned(),
            set_name: "Ward".to_owned(),
            slug: slug.to_owned(),
            external_id: String::new(),
            name: slug.to_owned(),
            metadata: Map::new(),
            simple_shape: shape.clone(),
            centroid: point!(x: offset + 0.5, y: 0.5),
            extent: geo::BoundingRect::bounding_rect(&shape),
            shape,
            crs: Crs::WGS84,
        }
    }

    #[rstest]
    fn dropped_transactions_roll_back(set: BoundarySet) {
        let mut store = MemoryStore::default();
        {
            let mut tx = store.begin().expect("begin");
            let handle = tx.create_set(&set).expect("create set");
            tx.bulk_create_boundaries(handle, &[boundary("ward-1", 0.0)])
                .expect("insert");
        }
        assert!(!store.set_exists("Wards").expect("exists query"));
        assert_eq!(store.boundary_count(), 0);
    }

    #[rstest]
    fn committed_sets_are_queryable(set: BoundarySet) {
        let mut store = MemoryStore::default();
        let mut tx = store.begin().expect("begin");
        let handle = tx.create_set(&set).expect("create set");
        tx.bulk_create_boundaries(handle, &[boundary("ward-2", 2.0), boundary("ward-1", 0.0)])
            .expect("insert");
        let count = tx.count_boundaries(handle).expect("count");
        tx.finalize_count(handle, count).expect("finalize");
        tx.commit().expect("commit");

        let stored = store.boundary_set("wards").expect("query").expect("set");
        assert_eq!(stored.count, 2);
        let slugs: Vec<_> = store
            .boundaries("wards")
            .expect("query")
            .into_iter()
            .map(|b| b.slug)
            .collect();
        assert_eq!(slugs, ["ward-1", "ward-2"]);
        let hits = store
            .boundaries_containing(point!(x: 2.5, y: 0.5))
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().map(|b| b.slug.as_str()), Some("ward-2"));
    }

    #[rstest]
    fn duplicate_boundary_slugs_are_rejected(set: BoundarySet) {
        let mut store = MemoryStore::default();
        let mut tx = store.begin().expect("begin");
        let handle = tx.create_set(&set).expect("create set");
        let err = tx
            .bulk_create_boundaries(handle, &[boundary("ward-1", 0.0), boundary("ward-1", 2.0)])
            .expect_err("duplicate slug");
        assert!(matches!(err, MemoryStoreError::DuplicateBoundary { .. }));
    }
}
