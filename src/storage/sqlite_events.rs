//! SQLite PREMIS event store
//!
//! Events embedded in an object tree and standalone events share one table.
//! Embedded events carry exactly one owner column; standalone events carry
//! none, or `linked_intellectual_object_id` when they name an object.
//!
//! Lookups by identifier see both kinds. An embedded event reports the
//! revision row it hangs off, reached through its fileset or file if needed.

use super::database::{column, Database};
use super::{PremisEventStore, RevisionRef};
use crate::error::{CatalogError, Result};
use crate::models::{LinkedPremisEvent, LinkingAgent, PremisEvent};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "e.identifier, e.type, e.detail, e.date_time, e.outcome, \
     e.outcome_detail_note, e.linking_agent_value, e.linking_agent_type, e.linking_agent_role";

/// Row that an event row hangs off
#[derive(Debug, Clone, Copy)]
pub(crate) enum EventOwner {
    Object(i64),
    Fileset(i64),
    ObjectFile(i64),
    /// Standalone event bound to a stored object revision
    Linked(i64),
    /// Standalone event without an object
    Unlinked,
}

impl EventOwner {
    fn column(self) -> Option<(&'static str, i64)> {
        match self {
            EventOwner::Object(id) => Some(("intellectual_object_id", id)),
            EventOwner::Fileset(id) => Some(("fileset_id", id)),
            EventOwner::ObjectFile(id) => Some(("object_file_id", id)),
            EventOwner::Linked(id) => Some(("linked_intellectual_object_id", id)),
            EventOwner::Unlinked => None,
        }
    }
}

pub(crate) async fn insert_event(
    conn: &mut SqliteConnection,
    event: &PremisEvent,
    owner: EventOwner,
) -> Result<()> {
    let (owner_column, owner_id) = match owner.column() {
        Some((column, id)) => (column, Some(id)),
        // any owner column works for a NULL binding
        None => ("linked_intellectual_object_id", None),
    };
    let sql = format!(
        r#"
        INSERT INTO catalog_premis_event
            (identifier, type, detail, date_time, outcome, outcome_detail_note,
             linking_agent_value, linking_agent_type, linking_agent_role, {})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        owner_column
    );

    sqlx::query(&sql)
        .bind(event.identifier)
        .bind(&event.event_type)
        .bind(&event.detail)
        .bind(event.date_time)
        .bind(&event.outcome)
        .bind(&event.outcome_detail_note)
        .bind(&event.linking_agent.value)
        .bind(&event.linking_agent.agent_type)
        .bind(&event.linking_agent.role)
        .bind(owner_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to insert premis event", e))?;

    Ok(())
}

pub(crate) fn event_from_row(row: &SqliteRow) -> Result<PremisEvent> {
    Ok(PremisEvent {
        identifier: column(row, "identifier")?,
        event_type: column(row, "type")?,
        detail: column(row, "detail")?,
        date_time: column(row, "date_time")?,
        outcome: column(row, "outcome")?,
        outcome_detail_note: column(row, "outcome_detail_note")?,
        linking_agent: LinkingAgent {
            value: column(row, "linking_agent_value")?,
            agent_type: column(row, "linking_agent_type")?,
            role: column(row, "linking_agent_role")?,
        },
    })
}

/// Events owned by one row, in insertion order
pub(crate) async fn load_events(
    conn: &mut SqliteConnection,
    owner: EventOwner,
) -> Result<Vec<PremisEvent>> {
    let Some((owner_column, owner_id)) = owner.column() else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "SELECT {} FROM catalog_premis_event e WHERE e.{} = ? ORDER BY e.id",
        EVENT_COLUMNS, owner_column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CatalogError::storage("Failed to load premis events", e))?;
    rows.iter().map(event_from_row).collect()
}

/// SQLite-backed [`PremisEventStore`]
#[derive(Clone)]
pub struct SqlitePremisEventStore {
    database: Database,
}

impl SqlitePremisEventStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    async fn fetch_event(&self, identifier: Uuid) -> Result<Option<SqliteRow>> {
        let sql = format!(
            r#"
            SELECT {}, o.identifier AS object_identifier, o.revision_number AS object_revision
            FROM catalog_premis_event e
            LEFT JOIN catalog_object_file f ON f.id = e.object_file_id
            LEFT JOIN catalog_fileset s ON s.id = COALESCE(e.fileset_id, f.fileset_id)
            LEFT JOIN catalog_intellectual_object o ON o.id = COALESCE(
                e.linked_intellectual_object_id,
                e.intellectual_object_id,
                s.intellectual_object_id,
                f.intellectual_object_id
            )
            WHERE e.identifier = ?
            "#,
            EVENT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(self.database.pool())
            .await
            .map_err(|e| CatalogError::storage("Failed to fetch premis event", e))
    }
}

fn revision_from_row(row: &SqliteRow) -> Result<Option<RevisionRef>> {
    let identifier: Option<Uuid> = column(row, "object_identifier")?;
    let revision_number: Option<i64> = column(row, "object_revision")?;
    Ok(identifier
        .zip(revision_number)
        .map(|(identifier, revision_number)| RevisionRef {
            identifier,
            revision_number,
        }))
}

#[async_trait]
impl PremisEventStore for SqlitePremisEventStore {
    async fn add(&self, event: &LinkedPremisEvent) -> Result<()> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .map_err(|e| CatalogError::storage("Failed to begin transaction", e))?;

        let owner = match event.intellectual_object_identifier {
            Some(identifier) => {
                let object_id: Option<i64> = sqlx::query_scalar(
                    "SELECT intellectual_object_id FROM catalog_current_revision WHERE intellectual_object_identifier = ?",
                )
                .bind(identifier)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CatalogError::storage("Failed to resolve current revision", e))?;

                let object_id = object_id.ok_or_else(|| {
                    CatalogError::not_found(format!("intellectual object {}", identifier))
                })?;
                EventOwner::Linked(object_id)
            }
            None => EventOwner::Unlinked,
        };

        insert_event(&mut tx, &event.event, owner).await?;
        tx.commit()
            .await
            .map_err(|e| CatalogError::storage("Failed to commit premis event", e))?;

        info!(event = %event.event.identifier, owner = ?owner, "Premis event added");
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<LinkedPremisEvent>> {
        let Some(row) = self.fetch_event(identifier).await? else {
            debug!(event = %identifier, "Premis event not found");
            return Ok(None);
        };
        let link = revision_from_row(&row)?;
        Ok(Some(LinkedPremisEvent {
            event: event_from_row(&row)?,
            intellectual_object_identifier: link.map(|link| link.identifier),
        }))
    }

    async fn linked_revision(&self, identifier: Uuid) -> Result<Option<RevisionRef>> {
        match self.fetch_event(identifier).await? {
            Some(row) => revision_from_row(&row),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(note: &str) -> PremisEvent {
        PremisEvent {
            identifier: Uuid::new_v4(),
            event_type: "event:ingestion".to_string(),
            detail: "ingested from bag".to_string(),
            date_time: Utc.with_ymd_and_hms(2025, 5, 2, 14, 0, 0).unwrap(),
            outcome: "success".to_string(),
            outcome_detail_note: note.to_string(),
            linking_agent: LinkingAgent {
                value: "dor-ingest".to_string(),
                agent_type: "software".to_string(),
                role: "executor".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_unlinked_event_round_trips() {
        let store = SqlitePremisEventStore::new(Database::in_memory().await.unwrap());
        let linked = LinkedPremisEvent {
            event: event("no object"),
            intellectual_object_identifier: None,
        };

        store.add(&linked).await.unwrap();

        assert_eq!(store.get(linked.event.identifier).await.unwrap(), Some(linked.clone()));
        assert_eq!(store.linked_revision(linked.event.identifier).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let store = SqlitePremisEventStore::new(Database::in_memory().await.unwrap());
        let linked = LinkedPremisEvent {
            event: event("dangling"),
            intellectual_object_identifier: Some(Uuid::new_v4()),
        };

        let err = store.add(&linked).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get(linked.event.identifier).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_identifier_is_rejected() {
        let store = SqlitePremisEventStore::new(Database::in_memory().await.unwrap());
        let linked = LinkedPremisEvent {
            event: event("first"),
            intellectual_object_identifier: None,
        };

        store.add(&linked).await.unwrap();
        let err = store.add(&linked).await.unwrap_err();
        assert!(err.is_integrity_violation());
    }
}
