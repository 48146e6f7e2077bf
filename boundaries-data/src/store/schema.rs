#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

pub const SCHEMA_VERSION: i64 = 1;

/// Errors raised when initialising the boundary schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        #[source]
        source: SqliteError,
    },
    #[error("failed to execute migration step '{step}'")]
    Migration {
        step: &'static str,
        #[source]
        source: SqliteError,
    },
    #[error(
        "expected boundary schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch { expected: i64, found: i64 },
}

/// Create the boundary tables and indexes and record the schema version.
///
/// Safe to call on every open: existing databases must already carry
/// [`SCHEMA_VERSION`].
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use boundaries_data::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create boundary schema");
/// let version: i64 = conn
///     .query_row("SELECT version FROM boundaries_schema_version", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| SchemaError::ForeignKeys { source })?;

    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create boundary_sets",
        "CREATE TABLE IF NOT EXISTS boundary_sets (
            id INTEGER PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE CHECK (length(trim(slug)) > 0),
            name TEXT NOT NULL UNIQUE,
            singular TEXT NOT NULL,
            authority TEXT NOT NULL,
            domain TEXT NOT NULL,
            last_updated TEXT,
            source_url TEXT,
            licence_url TEXT,
            data_url TEXT,
            notes TEXT NOT NULL,
            extra TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
            metadata_fields TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create boundaries",
        "CREATE TABLE IF NOT EXISTS boundaries (
            id INTEGER PRIMARY KEY,
            set_id INTEGER NOT NULL,
            set_name TEXT NOT NULL,
            slug TEXT NOT NULL CHECK (length(trim(slug)) > 0),
            external_id TEXT NOT NULL,
            name TEXT NOT NULL,
            metadata TEXT NOT NULL,
            shape TEXT NOT NULL,
            simple_shape TEXT NOT NULL,
            centroid_x REAL NOT NULL,
            centroid_y REAL NOT NULL,
            min_x REAL,
            min_y REAL,
            max_x REAL,
            max_y REAL,
            crs TEXT NOT NULL,
            UNIQUE (set_id, slug),
            FOREIGN KEY (set_id) REFERENCES boundary_sets(id) ON DELETE CASCADE
        )",
    )
}

fn create_indexes(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "index boundaries by set",
        "CREATE INDEX IF NOT EXISTS idx_boundaries_set ON boundaries(set_id, slug)",
    )?;
    run_migration_step(
        transaction,
        "index boundaries by extent",
        "CREATE INDEX IF NOT EXISTS idx_boundaries_extent
            ON boundaries(min_x, max_x, min_y, max_y)",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS boundaries_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM boundaries_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO boundaries_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}
