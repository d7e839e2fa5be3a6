//! Catalog storage
//!
//! Three store contracts, each implemented twice:
//!
//! - [`Catalog`]: revisioned intellectual objects
//! - [`CollectionStore`]: collections (insert-only; the catalog upserts)
//! - [`PremisEventStore`]: standalone provenance events
//!
//! The in-memory backend ([`memory`]) is the reference implementation. The
//! SQLite backend ([`database`], `sqlite_*`) must be observably identical;
//! `tests/catalog_conformance.rs` runs one suite against both.
//!
//! ## Database Schema
//!
//! ```text
//! catalog_collection ◄──── catalog_collection_membership ────► catalog_intellectual_object
//!                                                                  ▲   ▲   ▲
//! catalog_current_revision ────────────────────────────────────────┘   │   │
//! catalog_fileset ─────────────────────────────────────────────────────┘   │
//!   ▲                                                                      │
//! catalog_object_file ── (fileset_id | intellectual_object_id) ────────────┘
//!   ▲
//! catalog_checksum
//! catalog_premis_event ── (owner: object | fileset | object_file, or store link)
//! ```

pub mod codec;
pub mod database;
pub mod memory;
pub mod sqlite_catalog;
pub mod sqlite_collections;
pub mod sqlite_events;

use crate::error::{CatalogError, Result};
use crate::infrastructure::config::{BackendKind, CatalogConfig, RevisionPolicy};
use crate::models::{Collection, Fileset, IntellectualObject, LinkedPremisEvent, ObjectFilters, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub use database::Database;
pub use memory::{MemoryBackend, MemoryCatalog, MemoryCollectionStore, MemoryPremisEventStore};
pub use sqlite_catalog::SqliteCatalog;
pub use sqlite_collections::SqliteCollectionStore;
pub use sqlite_events::SqlitePremisEventStore;

/// Behavior switches shared by both catalog backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    pub revision_policy: RevisionPolicy,
}

impl CatalogOptions {
    pub fn store_enforced() -> Self {
        Self {
            revision_policy: RevisionPolicy::StoreEnforced,
        }
    }
}

/// A specific stored revision of a logical identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionRef {
    pub identifier: Uuid,
    pub revision_number: i64,
}

/// Revisioned store of intellectual object trees
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Store the whole graph, upsert its collections and make it the current
    /// revision of `object.identifier`.
    async fn add(&self, object: &IntellectualObject) -> Result<()>;

    /// Current revision, fully hydrated
    async fn get(&self, identifier: Uuid) -> Result<Option<IntellectualObject>>;

    async fn get_current_revision_number(&self, identifier: Uuid) -> Result<Option<i64>>;

    /// Direct historical lookup; superseded revisions stay retrievable
    async fn get_revision(
        &self,
        identifier: Uuid,
        revision_number: i64,
    ) -> Result<Option<IntellectualObject>>;

    /// Every stored revision number, ascending
    async fn get_revision_numbers(&self, identifier: Uuid) -> Result<Vec<i64>>;

    /// Current top-level objects matching `filters`, in insertion order of
    /// their current revision
    async fn find(
        &self,
        filters: &ObjectFilters,
        start: usize,
        limit: usize,
    ) -> Result<Vec<IntellectualObject>>;

    async fn find_total(&self, filters: &ObjectFilters) -> Result<usize>;

    /// Types of current top-level objects, first-seen order
    async fn get_distinct_types(&self) -> Result<Vec<String>>;

    async fn get_filesets_for_object(
        &self,
        identifier: Uuid,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Fileset>>;

    async fn get_filesets_total(&self, identifier: Uuid) -> Result<usize>;

    /// Remove every revision of `identifier` together with everything it
    /// owns. Collections are left in place. Returns whether anything was
    /// removed.
    async fn delete(&self, identifier: Uuid) -> Result<bool>;

    async fn find_page(
        &self,
        filters: &ObjectFilters,
        start: usize,
        limit: usize,
    ) -> Result<Page<IntellectualObject>> {
        let total = self.find_total(filters).await?;
        let items = self.find(filters, start, limit).await?;
        Ok(Page::new(items, total, start, limit))
    }

    async fn get_filesets_page(
        &self,
        identifier: Uuid,
        start: usize,
        limit: usize,
    ) -> Result<Page<Fileset>> {
        let total = self.get_filesets_total(identifier).await?;
        let items = self.get_filesets_for_object(identifier, start, limit).await?;
        Ok(Page::new(items, total, start, limit))
    }
}

/// Collection CRUD and listing
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Insert only; an existing identifier is an integrity violation
    async fn add(&self, collection: &Collection) -> Result<()>;

    async fn get(&self, identifier: Uuid) -> Result<Option<Collection>>;

    async fn find(
        &self,
        collection_type: Option<&str>,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Collection>>;

    async fn find_total(&self, collection_type: Option<&str>) -> Result<usize>;

    async fn find_all(&self) -> Result<Vec<Collection>>;

    async fn find_page(
        &self,
        collection_type: Option<&str>,
        start: usize,
        limit: usize,
    ) -> Result<Page<Collection>> {
        let total = self.find_total(collection_type).await?;
        let items = self.find(collection_type, start, limit).await?;
        Ok(Page::new(items, total, start, limit))
    }
}

/// Append-only log of standalone provenance events
#[async_trait]
pub trait PremisEventStore: Send + Sync {
    /// Store the event. When it names an intellectual object, the link is
    /// bound to that object's current revision at this moment.
    async fn add(&self, event: &LinkedPremisEvent) -> Result<()>;

    /// Standalone events, and events embedded in any stored revision. An
    /// embedded event reports the object that owns it.
    async fn get(&self, identifier: Uuid) -> Result<Option<LinkedPremisEvent>>;

    /// Revision the event was bound to when it was added, or the revision
    /// that holds an embedded event
    async fn linked_revision(&self, identifier: Uuid) -> Result<Option<RevisionRef>>;
}

/// The three stores of one backend, sharing one underlying state
#[derive(Clone)]
pub struct CatalogStores {
    pub catalog: Arc<dyn Catalog>,
    pub collections: Arc<dyn CollectionStore>,
    pub events: Arc<dyn PremisEventStore>,
    kind: BackendKind,
    database: Option<Database>,
}

impl CatalogStores {
    pub fn memory(options: CatalogOptions) -> Self {
        let backend = MemoryBackend::new();
        Self {
            catalog: Arc::new(backend.catalog(options)),
            collections: Arc::new(backend.collections()),
            events: Arc::new(backend.events()),
            kind: BackendKind::Memory,
            database: None,
        }
    }

    pub fn sqlite(database: Database, options: CatalogOptions) -> Self {
        Self {
            catalog: Arc::new(SqliteCatalog::new(database.clone(), options)),
            collections: Arc::new(SqliteCollectionStore::new(database.clone())),
            events: Arc::new(SqlitePremisEventStore::new(database.clone())),
            kind: BackendKind::Sqlite,
            database: Some(database),
        }
    }

    /// Open the backend selected by the configuration
    pub async fn open(config: &CatalogConfig) -> Result<Self> {
        let options = CatalogOptions {
            revision_policy: config.revisions.policy,
        };
        info!(backend = ?config.backend, policy = ?options.revision_policy, "Opening catalog stores");

        match config.backend {
            BackendKind::Memory => Ok(Self::memory(options)),
            BackendKind::Sqlite => {
                let database = Database::connect(&config.database).await?;
                Ok(Self::sqlite(database, options))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Release the connection pool, if any
    pub async fn close(self) {
        if let Some(database) = self.database {
            database.close().await;
        }
    }
}

/// Checks shared by both backends before anything is written
pub(crate) fn validate_object_graph(object: &IntellectualObject) -> Result<()> {
    codec::validate_alternate_identifiers(&object.alternate_identifiers)?;
    for collection in &object.collections {
        codec::validate_alternate_identifiers(&collection.alternate_identifiers)?;
    }

    let mut fileset_revisions = HashSet::new();
    for fileset in &object.filesets {
        codec::validate_alternate_identifiers(&fileset.alternate_identifiers)?;
        if !fileset_revisions.insert((fileset.identifier, fileset.revision_number)) {
            return Err(CatalogError::integrity_violation(format!(
                "fileset {} revision {} appears twice",
                fileset.identifier, fileset.revision_number
            )));
        }
    }

    let files = object
        .object_files
        .iter()
        .chain(object.filesets.iter().flat_map(|f| f.object_files.iter()));
    for file in files {
        if file.size < 0 {
            return Err(CatalogError::validation_error(format!(
                "object file {} has negative size {}",
                file.identifier, file.size
            )));
        }
    }

    let mut event_identifiers = HashSet::new();
    for event in object.all_premis_events() {
        if !event_identifiers.insert(event.identifier) {
            return Err(CatalogError::integrity_violation(format!(
                "premis event {} appears twice",
                event.identifier
            )));
        }
    }

    Ok(())
}

/// Revision policy check; `current` is the stored current revision, if any
pub(crate) fn check_revision_policy(
    options: &CatalogOptions,
    object: &IntellectualObject,
    current: Option<i64>,
) -> Result<()> {
    if options.revision_policy != RevisionPolicy::StoreEnforced {
        return Ok(());
    }
    match current {
        Some(current) if object.revision_number <= current => Err(CatalogError::StaleRevision {
            identifier: object.identifier,
            current,
            supplied: object.revision_number,
        }),
        _ => Ok(()),
    }
}
