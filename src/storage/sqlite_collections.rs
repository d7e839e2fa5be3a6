//! SQLite collection store

use super::codec::{decode_alternate_identifiers, encode_alternate_identifiers};
use super::database::{column, count_to_usize, sql_bound, Database};
use super::CollectionStore;
use crate::error::{CatalogError, Result};
use crate::models::Collection;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

pub(crate) const COLLECTION_COLUMNS: &str =
    "c.id, c.identifier, c.alternate_identifiers, c.title, c.description, c.type, c.created_at, c.updated_at";

pub(crate) fn collection_from_row(row: &SqliteRow) -> Result<Collection> {
    let alternate_identifiers: String = column(row, "alternate_identifiers")?;
    Ok(Collection {
        identifier: column(row, "identifier")?,
        alternate_identifiers: decode_alternate_identifiers(&alternate_identifiers),
        title: column(row, "title")?,
        description: column(row, "description")?,
        collection_type: column(row, "type")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

async fn insert_collection(conn: &mut SqliteConnection, collection: &Collection) -> Result<i64> {
    let alternate_identifiers = encode_alternate_identifiers(&collection.alternate_identifiers)?;
    let result = sqlx::query(
        r#"
        INSERT INTO catalog_collection
            (identifier, alternate_identifiers, title, description, type, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(collection.identifier)
    .bind(alternate_identifiers)
    .bind(&collection.title)
    .bind(&collection.description)
    .bind(&collection.collection_type)
    .bind(collection.created_at)
    .bind(collection.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to insert collection", e))?;

    Ok(result.last_insert_rowid())
}

/// Insert or overwrite by identifier, returning the row id
pub(crate) async fn upsert_collection(
    conn: &mut SqliteConnection,
    collection: &Collection,
) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM catalog_collection WHERE identifier = ?")
            .bind(collection.identifier)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| CatalogError::storage("Failed to look up collection", e))?;

    let Some(id) = existing else {
        return insert_collection(conn, collection).await;
    };

    let alternate_identifiers = encode_alternate_identifiers(&collection.alternate_identifiers)?;
    sqlx::query(
        r#"
        UPDATE catalog_collection
        SET alternate_identifiers = ?, title = ?, description = ?, type = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(alternate_identifiers)
    .bind(&collection.title)
    .bind(&collection.description)
    .bind(&collection.collection_type)
    .bind(collection.updated_at)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::storage("Failed to update collection", e))?;

    Ok(id)
}

fn type_filter(collection_type: Option<&str>) -> Option<String> {
    collection_type
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn listing_query(select: &str, collection_type: Option<&str>) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(select);
    builder.push(" FROM catalog_collection c");
    if let Some(collection_type) = type_filter(collection_type) {
        builder.push(" WHERE c.type = ").push_bind(collection_type);
    }
    builder
}

/// SQLite-backed [`CollectionStore`]
#[derive(Clone)]
pub struct SqliteCollectionStore {
    database: Database,
}

impl SqliteCollectionStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CollectionStore for SqliteCollectionStore {
    async fn add(&self, collection: &Collection) -> Result<()> {
        let mut conn = self
            .database
            .pool()
            .acquire()
            .await
            .map_err(|e| CatalogError::storage("Failed to acquire connection", e))?;
        insert_collection(&mut conn, collection).await?;
        info!(identifier = %collection.identifier, "Collection added");
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<Collection>> {
        let sql = format!(
            "SELECT {} FROM catalog_collection c WHERE c.identifier = ?",
            COLLECTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to fetch collection", e))?;

        row.as_ref().map(collection_from_row).transpose()
    }

    async fn find(
        &self,
        collection_type: Option<&str>,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Collection>> {
        let mut builder = listing_query(&format!("SELECT {}", COLLECTION_COLUMNS), collection_type);
        builder
            .push(" ORDER BY c.id LIMIT ")
            .push_bind(sql_bound(limit))
            .push(" OFFSET ")
            .push_bind(sql_bound(start));

        let rows = builder
            .build()
            .fetch_all(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to list collections", e))?;

        debug!(count = rows.len(), start, limit, "Collections listed");
        rows.iter().map(collection_from_row).collect()
    }

    async fn find_total(&self, collection_type: Option<&str>) -> Result<usize> {
        let mut builder = listing_query("SELECT COUNT(*)", collection_type);
        let total: i64 = builder
            .build_query_scalar()
            .fetch_one(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to count collections", e))?;
        Ok(count_to_usize(total))
    }

    async fn find_all(&self) -> Result<Vec<Collection>> {
        let sql = format!(
            "SELECT {} FROM catalog_collection c ORDER BY c.id",
            COLLECTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to list collections", e))?;
        rows.iter().map(collection_from_row).collect()
    }
}
