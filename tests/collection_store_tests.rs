mod common;

use common::{collection, object, stores, Backend};
use dor_catalog::infrastructure::{BackendKind, CatalogConfig};
use dor_catalog::storage::{CatalogOptions, CatalogStores, Database};
use dor_catalog::{CatalogError, Collection};
use rstest::rstest;
use tempfile::TempDir;
use uuid::Uuid;

fn typed(collection_type: &str, alt: &str) -> Collection {
    let mut c = collection(Uuid::new_v4(), &[alt], alt);
    c.collection_type = collection_type.to_string();
    c
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_add_get_and_reject_duplicates(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let box1 = typed("types:box", "box-1");

    stores.collections.add(&box1).await.unwrap();
    assert_eq!(stores.collections.get(box1.identifier).await.unwrap(), Some(box1.clone()));
    assert_eq!(stores.collections.get(Uuid::new_v4()).await.unwrap(), None);

    let mut renamed = box1.clone();
    renamed.title = "Renamed".to_string();
    let err = stores.collections.add(&renamed).await.unwrap_err();
    assert!(err.is_integrity_violation());
    assert_eq!(stores.collections.get(box1.identifier).await.unwrap(), Some(box1));
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_find_by_type_with_paging(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let added: Vec<Collection> = vec![
        typed("types:box", "box-1"),
        typed("types:series", "series-a"),
        typed("types:box", "box-2"),
        typed("types:box", "box-3"),
    ];
    for c in &added {
        stores.collections.add(c).await.unwrap();
    }

    let boxes = stores.collections.find(Some("types:box"), 1, 5).await.unwrap();
    assert_eq!(boxes, vec![added[2].clone(), added[3].clone()]);
    assert_eq!(stores.collections.find_total(Some("types:box")).await.unwrap(), 3);
    assert_eq!(stores.collections.find_total(Some("types:none")).await.unwrap(), 0);
    assert_eq!(stores.collections.find_total(None).await.unwrap(), 4);
    assert!(stores.collections.find(None, 10, 5).await.unwrap().is_empty());
    assert_eq!(stores.collections.find_all().await.unwrap(), added);

    let page = stores.collections.find_page(Some("types:box"), 0, 2).await.unwrap();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.next_offset(), Some(2));
    assert_eq!(page.previous_offset(), None);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_delimiter_in_alternate_identifier_is_rejected(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let bad = typed("types:box", "box,1");

    let err = stores.collections.add(&bad).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));
    assert!(stores.collections.find_all().await.unwrap().is_empty());
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_catalog_add_updates_stored_collection(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let original = typed("types:box", "box-1");
    stores.collections.add(&original).await.unwrap();

    let mut updated = original.clone();
    updated.title = "Box 1, relabelled".to_string();
    updated.updated_at = common::timestamp(20);
    let mut o = object(Uuid::new_v4(), "types:monograph", 1, 0);
    o.collections = vec![updated.clone()];
    stores.catalog.add(&o).await.unwrap();

    let stored = stores.collections.get(original.identifier).await.unwrap().unwrap();
    assert_eq!(stored.title, "Box 1, relabelled");
    assert_eq!(stored.updated_at, common::timestamp(20));
    assert_eq!(stored.created_at, original.created_at);
    assert_eq!(stores.collections.find_total(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_file_database_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let box1 = typed("types:box", "box-1");
    let mut o = object(Uuid::new_v4(), "types:monograph", 1, 2);
    o.collections = vec![box1.clone()];

    let database = Database::open(&path).await.unwrap();
    let stores = CatalogStores::sqlite(database, CatalogOptions::default());
    stores.catalog.add(&o).await.unwrap();
    stores.close().await;

    let reopened = CatalogStores::sqlite(Database::open(&path).await.unwrap(), CatalogOptions::default());
    assert_eq!(reopened.catalog.get(o.identifier).await.unwrap(), Some(o));
    assert_eq!(reopened.collections.find_all().await.unwrap(), vec![box1]);
    reopened.close().await;
}

#[tokio::test]
async fn test_open_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let toml = format!(
        r#"
        backend = "sqlite"

        [database]
        url = "sqlite://{}"
        max_connections = 2
        acquire_timeout_secs = 5
        create_if_missing = true
        "#,
        temp_dir.path().join("configured.db").display()
    );
    let config = CatalogConfig::from_toml_str(&toml).unwrap();

    let stores = CatalogStores::open(&config).await.unwrap();
    assert_eq!(stores.kind(), BackendKind::Sqlite);
    stores.collections.add(&typed("types:box", "box-9")).await.unwrap();
    assert_eq!(stores.collections.find_total(None).await.unwrap(), 1);
    stores.close().await;

    let memory = CatalogStores::open(&CatalogConfig::from_toml_str("backend = \"memory\"").unwrap())
        .await
        .unwrap();
    assert_eq!(memory.kind(), BackendKind::Memory);
}
