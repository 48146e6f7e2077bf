//! SQLite-backed boundary store.
//!
//! The store is split into focused submodules:
//! - [`schema`] materialises the tables, indexes and schema version.
//! - `rows` maps stored rows back into boundary sets and boundaries.
//!
//! Geometry and metadata columns hold JSON. Each boundary also keeps its
//! bounding box in plain columns so point lookups can filter on an index
//! before testing the full shape.
#![forbid(unsafe_code)]

mod rows;
mod schema;

use boundaries_core::{
    Boundary, BoundarySet, BoundaryStore, BoundaryStoreTransaction, Crs, SetHandle,
};
use camino::{Utf8Path, Utf8PathBuf};
use geo::Point;
use log::debug;
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction, params};
use thiserror::Error;

use rows::{BOUNDARY_COLUMNS, SET_COLUMNS, boundary_from_row, extent_columns, set_from_row};
pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};

/// Errors raised by [`SqliteBoundaryStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The database's parent directory could not be created.
    #[error("failed to create directory for {path}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The database could not be opened.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by SQLite.
        #[source]
        source: SqliteError,
    },
    /// The schema could not be initialised.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A query or statement failed.
    #[error("failed to {operation}")]
    Query {
        /// Short description of the failing operation.
        operation: &'static str,
        /// Source error returned by SQLite.
        #[source]
        source: SqliteError,
    },
    /// A value could not be encoded as JSON.
    #[error("failed to encode {column} as JSON")]
    Serialize {
        /// Target column.
        column: &'static str,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A boundary count does not fit a SQLite integer.
    #[error("boundary count {count} exceeds SQLite integer range")]
    CountOutOfRange {
        /// Rejected count.
        count: u64,
    },
}

fn query_error(operation: &'static str) -> impl FnOnce(SqliteError) -> SqliteStoreError {
    move |source| SqliteStoreError::Query { operation, source }
}

fn to_json<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|source| SqliteStoreError::Serialize { column, source })
}

/// Boundary store persisted in a SQLite database.
///
/// # Examples
/// ```
/// use boundaries_core::BoundaryStore;
/// use boundaries_data::store::SqliteBoundaryStore;
///
/// let store = SqliteBoundaryStore::open_in_memory().expect("open store");
/// assert!(store.boundary_sets().expect("list sets").is_empty());
/// ```
#[derive(Debug)]
pub struct SqliteBoundaryStore {
    connection: Connection,
    target_crs: Crs,
}

impl SqliteBoundaryStore {
    /// Open or create the database at `path`, creating parent directories
    /// and the schema as needed. Geometries are kept in WGS 84.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteStoreError> {
        boundaries_fs::ensure_parent_dir(path).map_err(|source| {
            SqliteStoreError::CreateDirectory {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let connection = Connection::open(path).map_err(|source| SqliteStoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("opened boundary store at {path}");
        Self::from_connection(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory().map_err(|source| SqliteStoreError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(connection)
    }

    /// Wrap an existing connection, initialising the schema.
    pub fn from_connection(mut connection: Connection) -> Result<Self, SqliteStoreError> {
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection,
            target_crs: Crs::WGS84,
        })
    }

    /// Keep geometries in `crs` instead of WGS 84.
    #[must_use]
    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = crs;
        self
    }
}

impl BoundaryStore for SqliteBoundaryStore {
    type Error = SqliteStoreError;
    type Transaction<'a> = SqliteTransaction<'a>;

    fn target_crs(&self) -> Crs {
        self.target_crs.clone()
    }

    fn set_exists(&self, name: &str) -> Result<bool, Self::Error> {
        self.connection
            .query_row(
                "SELECT 1 FROM boundary_sets WHERE name = ?1 LIMIT 1",
                [name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(query_error("look up boundary set"))
    }

    fn begin(&mut self) -> Result<Self::Transaction<'_>, Self::Error> {
        let transaction = self
            .connection
            .transaction()
            .map_err(query_error("begin boundary transaction"))?;
        Ok(SqliteTransaction { transaction })
    }

    fn boundary_set(&self, slug: &str) -> Result<Option<BoundarySet>, Self::Error> {
        self.connection
            .query_row(
                &format!("SELECT {SET_COLUMNS} FROM boundary_sets AS s WHERE s.slug = ?1"),
                [slug],
                set_from_row,
            )
            .optional()
            .map_err(query_error("read boundary set"))
    }

    fn boundary_sets(&self) -> Result<Vec<BoundarySet>, Self::Error> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {SET_COLUMNS} FROM boundary_sets AS s ORDER BY s.slug"
            ))
            .map_err(query_error("prepare boundary set listing"))?;
        statement
            .query_map([], set_from_row)
            .and_then(Iterator::collect)
            .map_err(query_error("list boundary sets"))
    }

    fn boundaries(&self, set_slug: &str) -> Result<Vec<Boundary>, Self::Error> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {BOUNDARY_COLUMNS} FROM boundaries AS b
                    JOIN boundary_sets AS s ON s.id = b.set_id
                    WHERE s.slug = ?1
                    ORDER BY b.slug"
            ))
            .map_err(query_error("prepare boundary listing"))?;
        statement
            .query_map([set_slug], boundary_from_row)
            .and_then(Iterator::collect)
            .map_err(query_error("list boundaries"))
    }

    fn boundary(&self, set_slug: &str, slug: &str) -> Result<Option<Boundary>, Self::Error> {
        self.connection
            .query_row(
                &format!(
                    "SELECT {BOUNDARY_COLUMNS} FROM boundaries AS b
                        JOIN boundary_sets AS s ON s.id = b.set_id
                        WHERE s.slug = ?1 AND b.slug = ?2"
                ),
                [set_slug, slug],
                boundary_from_row,
            )
            .optional()
            .map_err(query_error("read boundary"))
    }

    fn boundaries_containing(&self, point: Point<f64>) -> Result<Vec<Boundary>, Self::Error> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {BOUNDARY_COLUMNS} FROM boundaries AS b
                    JOIN boundary_sets AS s ON s.id = b.set_id
                    WHERE b.min_x <= ?1 AND b.max_x >= ?1
                        AND b.min_y <= ?2 AND b.max_y >= ?2
                    ORDER BY s.slug, b.slug"
            ))
            .map_err(query_error("prepare point lookup"))?;
        let candidates: Vec<Boundary> = statement
            .query_map(params![point.x(), point.y()], boundary_from_row)
            .and_then(Iterator::collect)
            .map_err(query_error("look up boundaries by point"))?;
        Ok(candidates
            .into_iter()
            .filter(|boundary| boundary.contains(&point))
            .collect())
    }
}

/// Write transaction over a [`SqliteBoundaryStore`]. Dropping it without
/// committing rolls back.
#[derive(Debug)]
pub struct SqliteTransaction<'a> {
    transaction: Transaction<'a>,
}

impl BoundaryStoreTransaction for SqliteTransaction<'_> {
    type Error = SqliteStoreError;

    fn delete_set_by_name(&mut self, name: &str) -> Result<bool, Self::Error> {
        let deleted = self
            .transaction
            .execute("DELETE FROM boundary_sets WHERE name = ?1", [name])
            .map_err(query_error("delete boundary set"))?;
        Ok(deleted > 0)
    }

    fn create_set(&mut self, set: &BoundarySet) -> Result<SetHandle, Self::Error> {
        let count = i64::try_from(set.count)
            .map_err(|_| SqliteStoreError::CountOutOfRange { count: set.count })?;
        self.transaction
            .execute(
                "INSERT INTO boundary_sets (
                    slug, name, singular, authority, domain, last_updated, source_url,
                    licence_url, data_url, notes, extra, count, metadata_fields
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    set.slug,
                    set.name,
                    set.singular,
                    set.authority,
                    set.domain,
                    set.last_updated.map(|date| date.to_string()),
                    set.source_url,
                    set.licence_url,
                    set.data_url,
                    set.notes,
                    to_json("extra", &set.extra)?,
                    count,
                    to_json("metadata_fields", &set.metadata_fields)?,
                ],
            )
            .map_err(query_error("insert boundary set"))?;
        Ok(SetHandle::new(self.transaction.last_insert_rowid()))
    }

    fn bulk_create_boundaries(
        &mut self,
        set: SetHandle,
        boundaries: &[Boundary],
    ) -> Result<(), Self::Error> {
        let mut insert = self
            .transaction
            .prepare_cached(
                "INSERT INTO boundaries (
                    set_id, set_name, slug, external_id, name, metadata, shape, simple_shape,
                    centroid_x, centroid_y, min_x, min_y, max_x, max_y, crs
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            )
            .map_err(query_error("prepare boundary insert"))?;
        for boundary in boundaries {
            let [min_x, min_y, max_x, max_y] = extent_columns(boundary.extent);
            insert
                .execute(params![
                    set.id(),
                    boundary.set_name,
                    boundary.slug,
                    boundary.external_id,
                    boundary.name,
                    to_json("metadata", &boundary.metadata)?,
                    to_json("shape", &boundary.shape)?,
                    to_json("simple_shape", &boundary.simple_shape)?,
                    boundary.centroid.x(),
                    boundary.centroid.y(),
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                    String::from(boundary.crs.clone()),
                ])
                .map_err(query_error("insert boundary"))?;
        }
        debug!("inserted {} boundaries into set {}", boundaries.len(), set.id());
        Ok(())
    }

    fn count_boundaries(&self, set: SetHandle) -> Result<u64, Self::Error> {
        let count: i64 = self
            .transaction
            .query_row(
                "SELECT COUNT(*) FROM boundaries WHERE set_id = ?1",
                [set.id()],
                |row| row.get(0),
            )
            .map_err(query_error("count boundaries"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn finalize_count(&mut self, set: SetHandle, count: u64) -> Result<(), Self::Error> {
        let stored =
            i64::try_from(count).map_err(|_| SqliteStoreError::CountOutOfRange { count })?;
        self.transaction
            .execute(
                "UPDATE boundary_sets SET count = ?1 WHERE id = ?2",
                [stored, set.id()],
            )
            .map_err(query_error("record boundary count"))?;
        Ok(())
    }

    fn commit(self) -> Result<(), Self::Error> {
        self.transaction
            .commit()
            .map_err(query_error("commit boundary transaction"))
    }
}
