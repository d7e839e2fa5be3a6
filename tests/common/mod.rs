//! Shared fixtures for the integration suites
//!
//! Every store test is parameterized over [`Backend`] so that the in-memory
//! and SQLite implementations run the exact same assertions.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dor_catalog::storage::{CatalogOptions, CatalogStores, Database};
use dor_catalog::{
    Checksum, Collection, Fileset, IntellectualObject, LinkedPremisEvent, LinkingAgent,
    ObjectFile, PremisEvent,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

/// Fresh, empty stores of the requested kind
pub async fn stores(backend: Backend) -> CatalogStores {
    stores_with(backend, CatalogOptions::default()).await
}

pub async fn stores_with(backend: Backend, options: CatalogOptions) -> CatalogStores {
    match backend {
        Backend::Memory => CatalogStores::memory(options),
        Backend::Sqlite => {
            let database = Database::in_memory()
                .await
                .expect("in-memory database should open");
            CatalogStores::sqlite(database, options)
        }
    }
}

pub fn timestamp(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 10, 0, 0).unwrap()
}

pub fn agent() -> LinkingAgent {
    LinkingAgent {
        value: "dor-ingest".to_string(),
        agent_type: "software".to_string(),
        role: "executor".to_string(),
    }
}

pub fn event(event_type: &str) -> PremisEvent {
    PremisEvent {
        identifier: Uuid::new_v4(),
        event_type: event_type.to_string(),
        detail: format!("{} detail", event_type),
        date_time: timestamp(2),
        outcome: "success".to_string(),
        outcome_detail_note: String::new(),
        linking_agent: agent(),
    }
}

pub fn linked_event(object: Option<Uuid>) -> LinkedPremisEvent {
    LinkedPremisEvent {
        event: event("event:validation"),
        intellectual_object_identifier: object,
    }
}

pub fn object_file(path: &str, function: &str, size: i64) -> ObjectFile {
    ObjectFile {
        identifier: Uuid::new_v4(),
        path: path.to_string(),
        file_format: "image/tiff".to_string(),
        file_function: function.to_string(),
        size,
        digest: vec![0x5a; 32],
        created_at: timestamp(1),
        updated_at: timestamp(1),
        last_fixity_check: timestamp(3),
        checksums: vec![Checksum {
            algorithm: "sha256".to_string(),
            digest: vec![0x5a; 32],
            created_at: timestamp(3),
        }],
        premis_events: vec![event("event:fixity-check")],
    }
}

/// A page with one 100 byte source file and one 50 byte service copy
pub fn page(order: usize, revision_number: i64) -> Fileset {
    Fileset {
        identifier: Uuid::new_v4(),
        alternate_identifiers: vec![format!("page-{}", order)],
        title: format!("Page {}", order),
        revision_number,
        created_at: timestamp(1),
        order_label: order.to_string(),
        object_files: vec![
            object_file(&format!("data/{:04}.tif", order), "function:source", 100),
            object_file(&format!("data/{:04}.jp2", order), "function:service", 50),
        ],
        premis_events: vec![event("event:ingestion")],
    }
}

pub fn collection(identifier: Uuid, alternate_identifiers: &[&str], title: &str) -> Collection {
    Collection {
        identifier,
        alternate_identifiers: alternate_identifiers.iter().map(|s| s.to_string()).collect(),
        title: title.to_string(),
        description: format!("{} description", title),
        collection_type: "types:box".to_string(),
        created_at: timestamp(1),
        updated_at: timestamp(1),
    }
}

/// Top-level object with the given number of pages and no collections
pub fn object(identifier: Uuid, object_type: &str, revision_number: i64, pages: usize) -> IntellectualObject {
    IntellectualObject {
        identifier,
        bin_identifier: identifier,
        alternate_identifiers: vec![format!("xyzzy:{}", identifier.simple())],
        object_type: object_type.to_string(),
        revision_number,
        created_at: timestamp(1),
        updated_at: timestamp(revision_number.clamp(1, 28) as u32),
        title: format!("{} r{}", object_type, revision_number),
        description: String::new(),
        filesets: (1..=pages).map(|order| page(order, revision_number)).collect(),
        object_files: vec![object_file("descriptor/object.xml", "function:descriptor", 900)],
        premis_events: vec![event("event:ingestion")],
        collections: vec![],
    }
}
