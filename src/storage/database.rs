//! SQLite database handle
//!
//! Owns the connection pool shared by the SQLite stores and creates the
//! catalog schema on connect. The handle is created by the caller at start
//! up, cloned into each store, and closed on shutdown.
//!
//! ## Features
//!
//! - Async SQLite operations using sqlx
//! - Foreign keys enforced on every connection (`ON DELETE CASCADE` owns the
//!   object tree lifecycle)
//! - WAL journal for file-backed databases

use crate::error::{CatalogError, Result};
use crate::infrastructure::config::DatabaseConfig;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Schema statements, executed in order on connect
const SCHEMA: &[(&str, &str)] = &[
    (
        "catalog_collection table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_collection (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier BLOB NOT NULL UNIQUE,
            alternate_identifiers TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "catalog_intellectual_object table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_intellectual_object (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier BLOB NOT NULL,
            bin_identifier BLOB NOT NULL,
            alternate_identifiers TEXT NOT NULL,
            type TEXT NOT NULL,
            revision_number INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            CONSTRAINT uq_intellectual_object_revision UNIQUE (identifier, revision_number)
        )
        "#,
    ),
    (
        "catalog_current_revision table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_current_revision (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            intellectual_object_identifier BLOB NOT NULL UNIQUE,
            revision_number INTEGER NOT NULL,
            intellectual_object_id INTEGER NOT NULL,
            FOREIGN KEY (intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "catalog_collection_membership table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_collection_membership (
            intellectual_object_id INTEGER NOT NULL,
            collection_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (intellectual_object_id, collection_id),
            FOREIGN KEY (intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE,
            FOREIGN KEY (collection_id)
                REFERENCES catalog_collection(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "catalog_fileset table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_fileset (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier BLOB NOT NULL,
            alternate_identifiers TEXT NOT NULL,
            title TEXT NOT NULL,
            revision_number INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            order_label TEXT NOT NULL,
            position INTEGER NOT NULL,
            intellectual_object_id INTEGER NOT NULL,
            FOREIGN KEY (intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE,
            CONSTRAINT uq_fileset_revision UNIQUE (identifier, revision_number)
        )
        "#,
    ),
    (
        "catalog_object_file table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_object_file (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier BLOB NOT NULL,
            path TEXT NOT NULL,
            file_format TEXT NOT NULL,
            file_function TEXT NOT NULL,
            size INTEGER NOT NULL CHECK (size >= 0),
            digest BLOB NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_fixity_check TEXT NOT NULL,
            intellectual_object_id INTEGER,
            fileset_id INTEGER,
            FOREIGN KEY (intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE,
            FOREIGN KEY (fileset_id)
                REFERENCES catalog_fileset(id) ON DELETE CASCADE,
            CHECK ((intellectual_object_id IS NULL) <> (fileset_id IS NULL))
        )
        "#,
    ),
    (
        "catalog_checksum table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_checksum (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            algorithm TEXT NOT NULL,
            digest BLOB NOT NULL,
            created_at TEXT NOT NULL,
            object_file_id INTEGER NOT NULL,
            FOREIGN KEY (object_file_id)
                REFERENCES catalog_object_file(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "catalog_premis_event table",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_premis_event (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier BLOB NOT NULL UNIQUE,
            type TEXT NOT NULL,
            detail TEXT NOT NULL,
            date_time TEXT NOT NULL,
            outcome TEXT NOT NULL,
            outcome_detail_note TEXT NOT NULL,
            linking_agent_value TEXT NOT NULL,
            linking_agent_type TEXT NOT NULL,
            linking_agent_role TEXT NOT NULL,
            intellectual_object_id INTEGER,
            fileset_id INTEGER,
            object_file_id INTEGER,
            linked_intellectual_object_id INTEGER,
            FOREIGN KEY (intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE,
            FOREIGN KEY (fileset_id)
                REFERENCES catalog_fileset(id) ON DELETE CASCADE,
            FOREIGN KEY (object_file_id)
                REFERENCES catalog_object_file(id) ON DELETE CASCADE,
            FOREIGN KEY (linked_intellectual_object_id)
                REFERENCES catalog_intellectual_object(id) ON DELETE CASCADE,
            CHECK (
                (intellectual_object_id IS NOT NULL)
                + (fileset_id IS NOT NULL)
                + (object_file_id IS NOT NULL)
                + (linked_intellectual_object_id IS NOT NULL) <= 1
            )
        )
        "#,
    ),
    (
        "object identifier index",
        "CREATE INDEX IF NOT EXISTS idx_object_identifier ON catalog_intellectual_object(identifier)",
    ),
    (
        "object bin index",
        "CREATE INDEX IF NOT EXISTS idx_object_bin ON catalog_intellectual_object(bin_identifier)",
    ),
    (
        "object type index",
        "CREATE INDEX IF NOT EXISTS idx_object_type ON catalog_intellectual_object(type)",
    ),
    (
        "collection type index",
        "CREATE INDEX IF NOT EXISTS idx_collection_type ON catalog_collection(type)",
    ),
    (
        "membership collection index",
        "CREATE INDEX IF NOT EXISTS idx_membership_collection ON catalog_collection_membership(collection_id)",
    ),
    (
        "fileset parent index",
        "CREATE INDEX IF NOT EXISTS idx_fileset_object ON catalog_fileset(intellectual_object_id)",
    ),
    (
        "object file object index",
        "CREATE INDEX IF NOT EXISTS idx_object_file_object ON catalog_object_file(intellectual_object_id)",
    ),
    (
        "object file fileset index",
        "CREATE INDEX IF NOT EXISTS idx_object_file_fileset ON catalog_object_file(fileset_id)",
    ),
    (
        "object file function index",
        "CREATE INDEX IF NOT EXISTS idx_object_file_function ON catalog_object_file(file_function)",
    ),
    (
        "checksum file index",
        "CREATE INDEX IF NOT EXISTS idx_checksum_object_file ON catalog_checksum(object_file_id)",
    ),
    (
        "event object index",
        "CREATE INDEX IF NOT EXISTS idx_event_object ON catalog_premis_event(intellectual_object_id)",
    ),
    (
        "event fileset index",
        "CREATE INDEX IF NOT EXISTS idx_event_fileset ON catalog_premis_event(fileset_id)",
    ),
    (
        "event object file index",
        "CREATE INDEX IF NOT EXISTS idx_event_object_file ON catalog_premis_event(object_file_id)",
    ),
    (
        "event link index",
        "CREATE INDEX IF NOT EXISTS idx_event_linked_object ON catalog_premis_event(linked_intellectual_object_id)",
    ),
];

/// Shared SQLite handle
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect using the configured URL and create the schema if needed
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The URL cannot be parsed
    /// - Failed to connect to database
    /// - Failed to create tables
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = normalize_url(&config.url);
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| CatalogError::storage("Invalid database URL", e))?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        info!(url = %url, "Initializing catalog database");

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_with(options)
            .await
            .map_err(|e| CatalogError::storage("Failed to connect to database", e))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open (or create) a database file, creating its directory first
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    /// Private in-memory database
    ///
    /// The pool is pinned to one connection that never expires; the data
    /// lives exactly as long as that connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CatalogError::storage("Invalid database URL", e))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| CatalogError::storage("Failed to open in-memory database", e))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        for (name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| CatalogError::storage(&format!("Failed to create {}", name), e))?;
            debug!(statement = %name, "Schema statement applied");
        }
        info!("Catalog schema initialized successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Catalog database closed");
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite://{}", url)
    }
}

/// Read one column, mapping decode failures to catalog errors
pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| CatalogError::storage(&format!("Failed to decode column {}", name), e))
}

/// Clamp a `usize` page bound to an SQLite integer
pub(crate) fn sql_bound(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn count_to_usize(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}
