//! Revisioned catalog of digital-repository objects
//!
//! An [`IntellectualObject`](models::IntellectualObject) is the unit of
//! preservation: a tree of filesets, files, checksums and PREMIS events that
//! belongs to any number of collections. Every `add` stores a new revision
//! and moves the object's current-revision pointer to it.
//!
//! Two interchangeable backends implement the store contracts in
//! [`storage`]:
//!
//! - [`storage::memory`]: in-process reference backend
//! - SQLite via sqlx ([`storage::Database`]): the persistent backend
//!
//! ```no_run
//! use dor_catalog::infrastructure::CatalogConfig;
//! use dor_catalog::storage::CatalogStores;
//!
//! # async fn run() -> dor_catalog::error::Result<()> {
//! let config = CatalogConfig::load(None)?;
//! dor_catalog::infrastructure::init_logging(&config.logging)?;
//! let stores = CatalogStores::open(&config).await?;
//! let types = stores.catalog.get_distinct_types().await?;
//! println!("{:?}", types);
//! stores.close().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod storage;

pub use error::{CatalogError, Result};
pub use models::{
    Checksum, Collection, Fileset, IntellectualObject, LinkedPremisEvent, LinkingAgent,
    ObjectFile, ObjectFilters, Page, PremisEvent,
};
pub use storage::{
    Catalog, CatalogOptions, CatalogStores, CollectionStore, PremisEventStore, RevisionRef,
};
