//! SQLite catalog
//!
//! Every revision is stored as its own row tree. `catalog_current_revision`
//! holds one pointer per logical identifier and is repointed inside the same
//! transaction that writes the new tree, so readers never observe a partial
//! revision.

use super::codec::{
    decode_alternate_identifiers, encode_alternate_identifiers, ALTERNATE_IDENTIFIER_DELIMITER,
};
use super::database::{column, count_to_usize, sql_bound, Database};
use super::sqlite_collections::{collection_from_row, upsert_collection, COLLECTION_COLUMNS};
use super::sqlite_events::{insert_event, load_events, EventOwner};
use super::{check_revision_policy, validate_object_graph, Catalog, CatalogOptions};
use crate::error::{CatalogError, Result};
use crate::models::{
    Checksum, Collection, Fileset, IntellectualObject, ObjectFile, ObjectFilters, PremisEvent,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};
use uuid::Uuid;

const OBJECT_COLUMNS: &str = "o.id, o.identifier, o.bin_identifier, o.alternate_identifiers, \
     o.type, o.revision_number, o.created_at, o.updated_at, o.title, o.description";

const FILESET_COLUMNS: &str = "f.id, f.identifier, f.alternate_identifiers, f.title, \
     f.revision_number, f.created_at, f.order_label";

const OBJECT_FILE_COLUMNS: &str = "id, identifier, path, file_format, file_function, size, \
     digest, created_at, updated_at, last_fixity_check";

/// Current top-level objects
const LISTING_FROM: &str = " FROM catalog_intellectual_object o \
     JOIN catalog_current_revision cr ON cr.intellectual_object_id = o.id \
     WHERE o.bin_identifier = o.identifier";

#[derive(Debug, Clone, Copy)]
enum FileOwner {
    Object(i64),
    Fileset(i64),
}

impl FileOwner {
    fn column(self) -> (&'static str, i64) {
        match self {
            FileOwner::Object(id) => ("intellectual_object_id", id),
            FileOwner::Fileset(id) => ("fileset_id", id),
        }
    }
}

/// SQLite-backed [`Catalog`]
#[derive(Clone)]
pub struct SqliteCatalog {
    database: Database,
    options: CatalogOptions,
}

impl SqliteCatalog {
    pub fn new(database: Database, options: CatalogOptions) -> Self {
        Self { database, options }
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>> {
        self.database
            .pool()
            .acquire()
            .await
            .map_err(|e| CatalogError::storage("Failed to acquire connection", e))
    }
}

// ---- write path ----

async fn current_revision_number(
    conn: &mut SqliteConnection,
    identifier: Uuid,
) -> Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT revision_number FROM catalog_current_revision WHERE intellectual_object_identifier = ?",
    )
    .bind(identifier)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to read current revision", e))
}

async fn insert_object_row(conn: &mut SqliteConnection, object: &IntellectualObject) -> Result<i64> {
    let alternate_identifiers = encode_alternate_identifiers(&object.alternate_identifiers)?;
    let result = sqlx::query(
        r#"
        INSERT INTO catalog_intellectual_object
            (identifier, bin_identifier, alternate_identifiers, type, revision_number,
             created_at, updated_at, title, description)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(object.identifier)
    .bind(object.bin_identifier)
    .bind(alternate_identifiers)
    .bind(&object.object_type)
    .bind(object.revision_number)
    .bind(object.created_at)
    .bind(object.updated_at)
    .bind(&object.title)
    .bind(&object.description)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to insert intellectual object", e))?;

    Ok(result.last_insert_rowid())
}

async fn insert_fileset(
    conn: &mut SqliteConnection,
    fileset: &Fileset,
    position: i64,
    object_id: i64,
) -> Result<()> {
    let alternate_identifiers = encode_alternate_identifiers(&fileset.alternate_identifiers)?;
    let result = sqlx::query(
        r#"
        INSERT INTO catalog_fileset
            (identifier, alternate_identifiers, title, revision_number, created_at,
             order_label, position, intellectual_object_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(fileset.identifier)
    .bind(alternate_identifiers)
    .bind(&fileset.title)
    .bind(fileset.revision_number)
    .bind(fileset.created_at)
    .bind(&fileset.order_label)
    .bind(position)
    .bind(object_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to insert fileset", e))?;

    let fileset_id = result.last_insert_rowid();
    for file in &fileset.object_files {
        insert_object_file(conn, file, FileOwner::Fileset(fileset_id)).await?;
    }
    insert_events(conn, &fileset.premis_events, EventOwner::Fileset(fileset_id)).await
}

async fn insert_object_file(
    conn: &mut SqliteConnection,
    file: &ObjectFile,
    owner: FileOwner,
) -> Result<()> {
    let (owner_column, owner_id) = owner.column();
    let sql = format!(
        r#"
        INSERT INTO catalog_object_file
            (identifier, path, file_format, file_function, size, digest,
             created_at, updated_at, last_fixity_check, {})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        owner_column
    );
    let result = sqlx::query(&sql)
        .bind(file.identifier)
        .bind(&file.path)
        .bind(&file.file_format)
        .bind(&file.file_function)
        .bind(file.size)
        .bind(&file.digest)
        .bind(file.created_at)
        .bind(file.updated_at)
        .bind(file.last_fixity_check)
        .bind(owner_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to insert object file", e))?;

    let file_id = result.last_insert_rowid();
    for checksum in &file.checksums {
        sqlx::query(
            "INSERT INTO catalog_checksum (algorithm, digest, created_at, object_file_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&checksum.algorithm)
        .bind(&checksum.digest)
        .bind(checksum.created_at)
        .bind(file_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to insert checksum", e))?;
    }
    insert_events(conn, &file.premis_events, EventOwner::ObjectFile(file_id)).await
}

async fn insert_events(
    conn: &mut SqliteConnection,
    events: &[PremisEvent],
    owner: EventOwner,
) -> Result<()> {
    for event in events {
        insert_event(conn, event, owner).await?;
    }
    Ok(())
}

async fn insert_memberships(
    conn: &mut SqliteConnection,
    collections: &[Collection],
    object_id: i64,
) -> Result<()> {
    for (position, collection) in collections.iter().enumerate() {
        let collection_id = upsert_collection(conn, collection).await?;
        // 重复的集合只保留首次出现的位置
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO catalog_collection_membership
                (intellectual_object_id, collection_id, position)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(object_id)
        .bind(collection_id)
        .bind(sql_bound(position))
        .execute(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to insert collection membership", e))?;
    }
    Ok(())
}

async fn point_current_revision(
    conn: &mut SqliteConnection,
    object: &IntellectualObject,
    object_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO catalog_current_revision
            (intellectual_object_identifier, revision_number, intellectual_object_id)
        VALUES (?, ?, ?)
        ON CONFLICT(intellectual_object_identifier) DO UPDATE SET
            revision_number = excluded.revision_number,
            intellectual_object_id = excluded.intellectual_object_id
        "#,
    )
    .bind(object.identifier)
    .bind(object.revision_number)
    .bind(object_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to update current revision", e))?;
    Ok(())
}

// ---- read path ----

async fn load_checksums(conn: &mut SqliteConnection, file_id: i64) -> Result<Vec<Checksum>> {
    let rows = sqlx::query(
        "SELECT algorithm, digest, created_at FROM catalog_checksum WHERE object_file_id = ? ORDER BY id",
    )
    .bind(file_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to load checksums", e))?;

    rows.iter()
        .map(|row| -> Result<Checksum> {
            Ok(Checksum {
                algorithm: column(row, "algorithm")?,
                digest: column(row, "digest")?,
                created_at: column(row, "created_at")?,
            })
        })
        .collect()
}

async fn load_object_files(conn: &mut SqliteConnection, owner: FileOwner) -> Result<Vec<ObjectFile>> {
    let (owner_column, owner_id) = owner.column();
    let sql = format!(
        "SELECT {} FROM catalog_object_file WHERE {} = ? ORDER BY id",
        OBJECT_FILE_COLUMNS, owner_column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to load object files", e))?;

    let mut files = Vec::with_capacity(rows.len());
    for row in &rows {
        let file_id: i64 = column(row, "id")?;
        files.push(ObjectFile {
            identifier: column(row, "identifier")?,
            path: column(row, "path")?,
            file_format: column(row, "file_format")?,
            file_function: column(row, "file_function")?,
            size: column(row, "size")?,
            digest: column(row, "digest")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
            last_fixity_check: column(row, "last_fixity_check")?,
            checksums: load_checksums(conn, file_id).await?,
            premis_events: load_events(conn, EventOwner::ObjectFile(file_id)).await?,
        });
    }
    Ok(files)
}

async fn hydrate_fileset(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<Fileset> {
    let fileset_id: i64 = column(row, "id")?;
    let alternate_identifiers: String = column(row, "alternate_identifiers")?;
    Ok(Fileset {
        identifier: column(row, "identifier")?,
        alternate_identifiers: decode_alternate_identifiers(&alternate_identifiers),
        title: column(row, "title")?,
        revision_number: column(row, "revision_number")?,
        created_at: column(row, "created_at")?,
        order_label: column(row, "order_label")?,
        object_files: load_object_files(conn, FileOwner::Fileset(fileset_id)).await?,
        premis_events: load_events(conn, EventOwner::Fileset(fileset_id)).await?,
    })
}

async fn load_filesets(conn: &mut SqliteConnection, object_id: i64) -> Result<Vec<Fileset>> {
    let sql = format!(
        "SELECT {} FROM catalog_fileset f WHERE f.intellectual_object_id = ? ORDER BY f.position, f.id",
        FILESET_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(object_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to load filesets", e))?;

    let mut filesets = Vec::with_capacity(rows.len());
    for row in &rows {
        filesets.push(hydrate_fileset(conn, row).await?);
    }
    Ok(filesets)
}

async fn load_collections(conn: &mut SqliteConnection, object_id: i64) -> Result<Vec<Collection>> {
    let sql = format!(
        r#"
        SELECT {} FROM catalog_collection c
        JOIN catalog_collection_membership m ON m.collection_id = c.id
        WHERE m.intellectual_object_id = ?
        ORDER BY m.position
        "#,
        COLLECTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(object_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to load collections", e))?;
    rows.iter().map(collection_from_row).collect()
}

async fn hydrate_object(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<IntellectualObject> {
    let object_id: i64 = column(row, "id")?;
    let alternate_identifiers: String = column(row, "alternate_identifiers")?;
    Ok(IntellectualObject {
        identifier: column(row, "identifier")?,
        bin_identifier: column(row, "bin_identifier")?,
        alternate_identifiers: decode_alternate_identifiers(&alternate_identifiers),
        object_type: column(row, "type")?,
        revision_number: column(row, "revision_number")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        filesets: load_filesets(conn, object_id).await?,
        object_files: load_object_files(conn, FileOwner::Object(object_id)).await?,
        premis_events: load_events(conn, EventOwner::Object(object_id)).await?,
        collections: load_collections(conn, object_id).await?,
    })
}

async fn hydrate_objects(
    conn: &mut SqliteConnection,
    rows: &[SqliteRow],
) -> Result<Vec<IntellectualObject>> {
    let mut objects = Vec::with_capacity(rows.len());
    for row in rows {
        objects.push(hydrate_object(conn, row).await?);
    }
    Ok(objects)
}

/// Shared FROM/WHERE of `find` and `find_total`
fn listing_query(select: &str, filters: &ObjectFilters) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(select);
    builder.push(LISTING_FROM);

    if let Some(object_type) = filters.object_type_value() {
        builder.push(" AND o.type = ").push_bind(object_type.to_string());
    }
    if let Some(prefix) = filters.alt_identifier_value() {
        // substr 区分大小写，LIKE 不区分
        builder
            .push(" AND substr(o.alternate_identifiers, 1, length(")
            .push_bind(prefix.to_string())
            .push(")) = ")
            .push_bind(prefix.to_string());
    }
    if let Some(alternate_identifier) = filters.collection_alt_identifier_value() {
        // 含分隔符的值不可能是单个条目
        if alternate_identifier.contains(ALTERNATE_IDENTIFIER_DELIMITER) {
            builder.push(" AND 0");
            return builder;
        }
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM catalog_collection_membership m \
                 JOIN catalog_collection c ON c.id = m.collection_id \
                 WHERE m.intellectual_object_id = o.id \
                 AND instr(',' || c.alternate_identifiers || ',', ",
            )
            .push_bind(format!(",{},", alternate_identifier))
            .push(") > 0)");
    }
    builder
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn add(&self, object: &IntellectualObject) -> Result<()> {
        validate_object_graph(object)?;

        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .map_err(|e| CatalogError::storage("Failed to begin transaction", e))?;

        let current = current_revision_number(&mut tx, object.identifier).await?;
        check_revision_policy(&self.options, object, current)?;

        let object_id = insert_object_row(&mut tx, object).await?;
        insert_memberships(&mut tx, &object.collections, object_id).await?;
        for (position, fileset) in object.filesets.iter().enumerate() {
            insert_fileset(&mut tx, fileset, sql_bound(position), object_id).await?;
        }
        for file in &object.object_files {
            insert_object_file(&mut tx, file, FileOwner::Object(object_id)).await?;
        }
        insert_events(&mut tx, &object.premis_events, EventOwner::Object(object_id)).await?;
        point_current_revision(&mut tx, object, object_id).await?;

        tx.commit()
            .await
            .map_err(|e| CatalogError::storage("Failed to commit intellectual object", e))?;

        info!(
            identifier = %object.identifier,
            revision = object.revision_number,
            previous = ?current,
            filesets = object.filesets.len(),
            "Intellectual object stored"
        );
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<IntellectualObject>> {
        let mut conn = self.acquire().await?;
        let sql = format!(
            r#"
            SELECT {} FROM catalog_intellectual_object o
            JOIN catalog_current_revision cr ON cr.intellectual_object_id = o.id
            WHERE cr.intellectual_object_identifier = ?
            "#,
            OBJECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| CatalogError::storage("Failed to fetch intellectual object", e))?;

        match row {
            Some(row) => Ok(Some(hydrate_object(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn get_current_revision_number(&self, identifier: Uuid) -> Result<Option<i64>> {
        let mut conn = self.acquire().await?;
        current_revision_number(&mut conn, identifier).await
    }

    async fn get_revision(
        &self,
        identifier: Uuid,
        revision_number: i64,
    ) -> Result<Option<IntellectualObject>> {
        let mut conn = self.acquire().await?;
        let sql = format!(
            "SELECT {} FROM catalog_intellectual_object o WHERE o.identifier = ? AND o.revision_number = ?",
            OBJECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .bind(revision_number)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| CatalogError::storage("Failed to fetch revision", e))?;

        match row {
            Some(row) => Ok(Some(hydrate_object(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn get_revision_numbers(&self, identifier: Uuid) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT revision_number FROM catalog_intellectual_object WHERE identifier = ? ORDER BY revision_number",
        )
        .bind(identifier)
        .fetch_all(self.database.pool())
        .await
        .map_err(|e| CatalogError::storage("Failed to list revisions", e))
    }

    async fn find(
        &self,
        filters: &ObjectFilters,
        start: usize,
        limit: usize,
    ) -> Result<Vec<IntellectualObject>> {
        let mut conn = self.acquire().await?;
        let mut builder = listing_query(&format!("SELECT {}", OBJECT_COLUMNS), filters);
        builder
            .push(" ORDER BY o.id LIMIT ")
            .push_bind(sql_bound(limit))
            .push(" OFFSET ")
            .push_bind(sql_bound(start));

        let rows = builder
            .build()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| CatalogError::storage("Failed to find intellectual objects", e))?;

        debug!(count = rows.len(), start, limit, filters = ?filters, "Intellectual objects found");
        hydrate_objects(&mut conn, &rows).await
    }

    async fn find_total(&self, filters: &ObjectFilters) -> Result<usize> {
        let mut builder = listing_query("SELECT COUNT(*)", filters);
        let total: i64 = builder
            .build_query_scalar()
            .fetch_one(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to count intellectual objects", e))?;
        Ok(count_to_usize(total))
    }

    async fn get_distinct_types(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT o.type{} GROUP BY o.type ORDER BY MIN(o.id)",
            LISTING_FROM
        );
        sqlx::query_scalar(&sql)
            .fetch_all(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to list object types", e))
    }

    async fn get_filesets_for_object(
        &self,
        identifier: Uuid,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Fileset>> {
        let mut conn = self.acquire().await?;
        let sql = format!(
            r#"
            SELECT {} FROM catalog_fileset f
            JOIN catalog_current_revision cr ON cr.intellectual_object_id = f.intellectual_object_id
            WHERE cr.intellectual_object_identifier = ?
            ORDER BY f.position, f.id
            LIMIT ? OFFSET ?
            "#,
            FILESET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(identifier)
            .bind(sql_bound(limit))
            .bind(sql_bound(start))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| CatalogError::storage("Failed to list filesets", e))?;

        let mut filesets = Vec::with_capacity(rows.len());
        for row in &rows {
            filesets.push(hydrate_fileset(&mut conn, row).await?);
        }
        Ok(filesets)
    }

    async fn get_filesets_total(&self, identifier: Uuid) -> Result<usize> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM catalog_fileset f
            JOIN catalog_current_revision cr ON cr.intellectual_object_id = f.intellectual_object_id
            WHERE cr.intellectual_object_identifier = ?
            "#,
        )
        .bind(identifier)
        .fetch_one(self.database.pool())
        .await
        .map_err(|e| CatalogError::storage("Failed to count filesets", e))?;
        Ok(count_to_usize(total))
    }

    async fn delete(&self, identifier: Uuid) -> Result<bool> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .map_err(|e| CatalogError::storage("Failed to begin transaction", e))?;

        sqlx::query("DELETE FROM catalog_current_revision WHERE intellectual_object_identifier = ?")
            .bind(identifier)
            .execute(&mut *tx)
            .await
            .map_err(|e| CatalogError::storage("Failed to delete current revision", e))?;

        // 子表（fileset、文件、校验和、事件、集合关系）由 ON DELETE CASCADE 清理
        let removed = sqlx::query("DELETE FROM catalog_intellectual_object WHERE identifier = ?")
            .bind(identifier)
            .execute(&mut *tx)
            .await
            .map_err(|e| CatalogError::storage("Failed to delete intellectual object", e))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| CatalogError::storage("Failed to commit delete", e))?;

        if removed == 0 {
            warn!(identifier = %identifier, "Delete requested for unknown intellectual object");
            return Ok(false);
        }
        info!(identifier = %identifier, revisions = removed, "Intellectual object deleted");
        Ok(true)
    }
}
