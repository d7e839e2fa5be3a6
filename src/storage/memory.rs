//! In-memory reference backend
//!
//! Keeps every added object in an append-only list and a map from logical
//! identifier to the current revision number. Reads walk the list and keep
//! only the entries whose revision matches the map, so superseded revisions
//! stay stored but never leak into default reads.
//!
//! The three stores handed out by [`MemoryBackend`] share one state, the same
//! way the SQLite stores share one database.

use crate::error::{CatalogError, Result};
use crate::models::{
    Collection, Fileset, IntellectualObject, LinkedPremisEvent, ObjectFilters, PremisEvent,
};
use crate::storage::codec::join_alternate_identifiers;
use crate::storage::{
    check_revision_policy, validate_object_graph, Catalog, CatalogOptions, CollectionStore,
    PremisEventStore, RevisionRef,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    objects: Vec<IntellectualObject>,
    current_revisions: HashMap<Uuid, i64>,
    collections: Vec<Collection>,
    events: Vec<StoredEvent>,
    fileset_revisions: HashSet<(Uuid, i64)>,
    event_identifiers: HashSet<Uuid>,
}

struct StoredEvent {
    event: LinkedPremisEvent,
    link: Option<RevisionRef>,
}

impl MemoryState {
    fn is_current(&self, object: &IntellectualObject) -> bool {
        self.current_revisions.get(&object.identifier) == Some(&object.revision_number)
    }

    fn find_revision(&self, identifier: Uuid, revision_number: i64) -> Option<&IntellectualObject> {
        self.objects
            .iter()
            .find(|o| o.identifier == identifier && o.revision_number == revision_number)
    }

    fn current(&self, identifier: Uuid) -> Option<&IntellectualObject> {
        let revision_number = *self.current_revisions.get(&identifier)?;
        self.find_revision(identifier, revision_number)
    }

    /// Event embedded anywhere in a stored revision, with its owning revision
    fn embedded_event(&self, identifier: Uuid) -> Option<(&IntellectualObject, &PremisEvent)> {
        self.objects.iter().find_map(|object| {
            object
                .all_premis_events()
                .find(|event| event.identifier == identifier)
                .map(|event| (object, event))
        })
    }

    fn collection(&self, identifier: Uuid) -> Option<&Collection> {
        self.collections.iter().find(|c| c.identifier == identifier)
    }

    /// Swap the collections captured at add time for their current state
    fn hydrate(&self, object: &IntellectualObject) -> IntellectualObject {
        let mut hydrated = object.clone();
        let mut seen = HashSet::new();
        hydrated.collections = object
            .collections
            .iter()
            .filter(|c| seen.insert(c.identifier))
            .map(|c| self.collection(c.identifier).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        hydrated
    }

    /// Current top-level objects, hydrated, in list order
    fn listed(&self) -> impl Iterator<Item = IntellectualObject> + '_ {
        self.objects
            .iter()
            .filter(|o| o.is_top_level() && self.is_current(o))
            .map(|o| self.hydrate(o))
    }

    fn upsert_collection(&mut self, collection: &Collection) {
        match self
            .collections
            .iter_mut()
            .find(|c| c.identifier == collection.identifier)
        {
            Some(existing) => {
                existing.alternate_identifiers = collection.alternate_identifiers.clone();
                existing.title = collection.title.clone();
                existing.description = collection.description.clone();
                existing.collection_type = collection.collection_type.clone();
                existing.updated_at = collection.updated_at;
                debug!(collection = %collection.identifier, "Updated collection in place");
            }
            None => {
                self.collections.push(collection.clone());
                debug!(collection = %collection.identifier, "Inserted collection");
            }
        }
    }

    fn check_unique(&self, object: &IntellectualObject) -> Result<()> {
        if self
            .find_revision(object.identifier, object.revision_number)
            .is_some()
        {
            return Err(CatalogError::integrity_violation(format!(
                "intellectual object {} revision {} already stored",
                object.identifier, object.revision_number
            )));
        }
        for fileset in &object.filesets {
            if self
                .fileset_revisions
                .contains(&(fileset.identifier, fileset.revision_number))
            {
                return Err(CatalogError::integrity_violation(format!(
                    "fileset {} revision {} already stored",
                    fileset.identifier, fileset.revision_number
                )));
            }
        }
        for event in object.all_premis_events() {
            if self.event_identifiers.contains(&event.identifier) {
                return Err(CatalogError::integrity_violation(format!(
                    "premis event {} already stored",
                    event.identifier
                )));
            }
        }
        Ok(())
    }
}

fn matches_filters(object: &IntellectualObject, filters: &ObjectFilters) -> bool {
    if let Some(object_type) = filters.object_type_value() {
        if object.object_type != object_type {
            return false;
        }
    }
    if let Some(prefix) = filters.alt_identifier_value() {
        if !join_alternate_identifiers(&object.alternate_identifiers).starts_with(prefix) {
            return false;
        }
    }
    if let Some(alternate_identifier) = filters.collection_alt_identifier_value() {
        let in_collection = object.collections.iter().any(|c| {
            c.alternate_identifiers
                .iter()
                .any(|value| value == alternate_identifier)
        });
        if !in_collection {
            return false;
        }
    }
    true
}

/// Shared state behind the memory stores
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self, options: CatalogOptions) -> MemoryCatalog {
        MemoryCatalog {
            state: self.state.clone(),
            options,
        }
    }

    pub fn collections(&self) -> MemoryCollectionStore {
        MemoryCollectionStore {
            state: self.state.clone(),
        }
    }

    pub fn events(&self) -> MemoryPremisEventStore {
        MemoryPremisEventStore {
            state: self.state.clone(),
        }
    }
}

pub struct MemoryCatalog {
    state: Arc<RwLock<MemoryState>>,
    options: CatalogOptions,
}

impl MemoryCatalog {
    /// Standalone catalog with its own state
    pub fn new(options: CatalogOptions) -> Self {
        MemoryBackend::new().catalog(options)
    }

    /// Number of stored revisions across all identifiers
    pub fn stored_revisions(&self) -> usize {
        self.state.read().objects.len()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn add(&self, object: &IntellectualObject) -> Result<()> {
        validate_object_graph(object)?;

        let mut state = self.state.write();
        let current = state.current_revisions.get(&object.identifier).copied();
        check_revision_policy(&self.options, object, current)?;
        if let Err(e) = state.check_unique(object) {
            warn!(identifier = %object.identifier, revision = object.revision_number, error = %e, "Rejected add");
            return Err(e);
        }

        for collection in &object.collections {
            state.upsert_collection(collection);
        }
        for fileset in &object.filesets {
            state
                .fileset_revisions
                .insert((fileset.identifier, fileset.revision_number));
        }
        let event_identifiers: Vec<Uuid> =
            object.all_premis_events().map(|e| e.identifier).collect();
        state.event_identifiers.extend(event_identifiers);
        state.objects.push(object.clone());
        state
            .current_revisions
            .insert(object.identifier, object.revision_number);

        info!(
            identifier = %object.identifier,
            revision = object.revision_number,
            previous = ?current,
            "Added intellectual object"
        );
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<IntellectualObject>> {
        let state = self.state.read();
        Ok(state.current(identifier).map(|o| state.hydrate(o)))
    }

    async fn get_current_revision_number(&self, identifier: Uuid) -> Result<Option<i64>> {
        Ok(self.state.read().current_revisions.get(&identifier).copied())
    }

    async fn get_revision(
        &self,
        identifier: Uuid,
        revision_number: i64,
    ) -> Result<Option<IntellectualObject>> {
        let state = self.state.read();
        Ok(state
            .find_revision(identifier, revision_number)
            .map(|o| state.hydrate(o)))
    }

    async fn get_revision_numbers(&self, identifier: Uuid) -> Result<Vec<i64>> {
        let state = self.state.read();
        let mut revisions: Vec<i64> = state
            .objects
            .iter()
            .filter(|o| o.identifier == identifier)
            .map(|o| o.revision_number)
            .collect();
        revisions.sort_unstable();
        Ok(revisions)
    }

    async fn find(
        &self,
        filters: &ObjectFilters,
        start: usize,
        limit: usize,
    ) -> Result<Vec<IntellectualObject>> {
        let state = self.state.read();
        Ok(state
            .listed()
            .filter(|o| matches_filters(o, filters))
            .skip(start)
            .take(limit)
            .collect())
    }

    async fn find_total(&self, filters: &ObjectFilters) -> Result<usize> {
        let state = self.state.read();
        Ok(state.listed().filter(|o| matches_filters(o, filters)).count())
    }

    async fn get_distinct_types(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        let mut types: Vec<String> = Vec::new();
        for object in state.listed() {
            if !types.contains(&object.object_type) {
                types.push(object.object_type);
            }
        }
        Ok(types)
    }

    async fn get_filesets_for_object(
        &self,
        identifier: Uuid,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Fileset>> {
        let state = self.state.read();
        Ok(state
            .current(identifier)
            .map(|o| o.filesets.iter().skip(start).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_filesets_total(&self, identifier: Uuid) -> Result<usize> {
        let state = self.state.read();
        Ok(state.current(identifier).map_or(0, |o| o.filesets.len()))
    }

    async fn delete(&self, identifier: Uuid) -> Result<bool> {
        let mut state = self.state.write();
        let MemoryState {
            objects,
            current_revisions,
            events,
            fileset_revisions,
            event_identifiers,
            ..
        } = &mut *state;

        let mut removed = 0usize;
        objects.retain(|object| {
            if object.identifier != identifier {
                return true;
            }
            for fileset in &object.filesets {
                fileset_revisions.remove(&(fileset.identifier, fileset.revision_number));
            }
            for event in object.all_premis_events() {
                event_identifiers.remove(&event.identifier);
            }
            removed += 1;
            false
        });
        current_revisions.remove(&identifier);

        // events bound to a removed revision go with it
        events.retain(|stored| {
            let linked = stored.link.is_some_and(|link| link.identifier == identifier);
            if linked {
                event_identifiers.remove(&stored.event.event.identifier);
            }
            !linked
        });

        if removed > 0 {
            info!(identifier = %identifier, revisions = removed, "Deleted intellectual object");
        }
        Ok(removed > 0)
    }
}

pub struct MemoryCollectionStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        MemoryBackend::new().collections()
    }
}

impl Default for MemoryCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_type(collection: &Collection, collection_type: Option<&str>) -> bool {
    match collection_type.filter(|t| !t.is_empty()) {
        Some(collection_type) => collection.collection_type == collection_type,
        None => true,
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn add(&self, collection: &Collection) -> Result<()> {
        crate::storage::codec::validate_alternate_identifiers(&collection.alternate_identifiers)?;

        let mut state = self.state.write();
        if state.collection(collection.identifier).is_some() {
            return Err(CatalogError::integrity_violation(format!(
                "collection {} already stored",
                collection.identifier
            )));
        }
        state.collections.push(collection.clone());
        debug!(collection = %collection.identifier, "Inserted collection");
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<Collection>> {
        Ok(self.state.read().collection(identifier).cloned())
    }

    async fn find(
        &self,
        collection_type: Option<&str>,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Collection>> {
        let state = self.state.read();
        Ok(state
            .collections
            .iter()
            .filter(|c| matches_type(c, collection_type))
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_total(&self, collection_type: Option<&str>) -> Result<usize> {
        let state = self.state.read();
        Ok(state
            .collections
            .iter()
            .filter(|c| matches_type(c, collection_type))
            .count())
    }

    async fn find_all(&self) -> Result<Vec<Collection>> {
        Ok(self.state.read().collections.clone())
    }
}

pub struct MemoryPremisEventStore {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl PremisEventStore for MemoryPremisEventStore {
    async fn add(&self, event: &LinkedPremisEvent) -> Result<()> {
        let mut state = self.state.write();
        // 先解析对象链接，再检查标识符唯一性
        let link = match event.intellectual_object_identifier {
            Some(identifier) => {
                let revision_number = state
                    .current_revisions
                    .get(&identifier)
                    .copied()
                    .ok_or_else(|| {
                        CatalogError::not_found(format!("intellectual object {}", identifier))
                    })?;
                Some(RevisionRef {
                    identifier,
                    revision_number,
                })
            }
            None => None,
        };
        if state.event_identifiers.contains(&event.event.identifier) {
            return Err(CatalogError::integrity_violation(format!(
                "premis event {} already stored",
                event.event.identifier
            )));
        }

        state.event_identifiers.insert(event.event.identifier);
        state.events.push(StoredEvent {
            event: event.clone(),
            link,
        });
        debug!(event = %event.event.identifier, link = ?link, "Added premis event");
        Ok(())
    }

    async fn get(&self, identifier: Uuid) -> Result<Option<LinkedPremisEvent>> {
        let state = self.state.read();
        if let Some(stored) = state
            .events
            .iter()
            .find(|stored| stored.event.event.identifier == identifier)
        {
            return Ok(Some(stored.event.clone()));
        }
        Ok(state
            .embedded_event(identifier)
            .map(|(object, event)| LinkedPremisEvent {
                event: event.clone(),
                intellectual_object_identifier: Some(object.identifier),
            }))
    }

    async fn linked_revision(&self, identifier: Uuid) -> Result<Option<RevisionRef>> {
        let state = self.state.read();
        if let Some(stored) = state
            .events
            .iter()
            .find(|stored| stored.event.event.identifier == identifier)
        {
            return Ok(stored.link);
        }
        Ok(state
            .embedded_event(identifier)
            .map(|(object, _)| RevisionRef {
                identifier: object.identifier,
                revision_number: object.revision_number,
            }))
    }
}
