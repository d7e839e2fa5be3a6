mod common;

use common::{event, linked_event, object, stores, Backend};
use dor_catalog::storage::RevisionRef;
use dor_catalog::LinkedPremisEvent;
use rstest::rstest;
use uuid::Uuid;

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_unlinked_event_round_trips(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let standalone = linked_event(None);

    stores.events.add(&standalone).await.unwrap();

    assert_eq!(
        stores.events.get(standalone.event.identifier).await.unwrap(),
        Some(standalone.clone())
    );
    assert_eq!(
        stores.events.linked_revision(standalone.event.identifier).await.unwrap(),
        None
    );
    assert_eq!(stores.events.get(Uuid::new_v4()).await.unwrap(), None);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_link_to_unknown_object_is_not_found(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let dangling = linked_event(Some(Uuid::new_v4()));

    let err = stores.events.add(&dangling).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert_eq!(stores.events.get(dangling.event.identifier).await.unwrap(), None);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_link_binds_current_revision_at_add_time(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let identifier = Uuid::new_v4();
    stores.catalog.add(&object(identifier, "types:monograph", 1, 1)).await.unwrap();
    stores.catalog.add(&object(identifier, "types:monograph", 2, 1)).await.unwrap();

    let at_two = linked_event(Some(identifier));
    stores.events.add(&at_two).await.unwrap();
    stores.catalog.add(&object(identifier, "types:monograph", 3, 1)).await.unwrap();
    let at_three = linked_event(Some(identifier));
    stores.events.add(&at_three).await.unwrap();

    assert_eq!(
        stores.events.linked_revision(at_two.event.identifier).await.unwrap(),
        Some(RevisionRef { identifier, revision_number: 2 })
    );
    assert_eq!(
        stores.events.linked_revision(at_three.event.identifier).await.unwrap(),
        Some(RevisionRef { identifier, revision_number: 3 })
    );
    // the revision it points at is still stored
    assert!(stores.catalog.get_revision(identifier, 2).await.unwrap().is_some());
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_event_identifiers_are_unique_across_owners(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let o = object(Uuid::new_v4(), "types:monograph", 1, 1);
    stores.catalog.add(&o).await.unwrap();

    // an identifier already used inside an object tree
    let reused = LinkedPremisEvent {
        event: o.premis_events[0].clone(),
        intellectual_object_identifier: None,
    };
    assert!(stores.events.add(&reused).await.unwrap_err().is_integrity_violation());

    let standalone = linked_event(None);
    stores.events.add(&standalone).await.unwrap();
    assert!(stores.events.add(&standalone).await.unwrap_err().is_integrity_violation());

    // and the other way round
    let mut clash = object(Uuid::new_v4(), "types:monograph", 1, 0);
    clash.premis_events = vec![standalone.event.clone()];
    assert!(stores.catalog.add(&clash).await.unwrap_err().is_integrity_violation());
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_embedded_event_is_found_by_identifier(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let o = object(Uuid::new_v4(), "types:monograph", 1, 1);
    stores.catalog.add(&o).await.unwrap();

    let embedded = &o.filesets[0].premis_events[0];
    assert_eq!(
        stores.events.get(embedded.identifier).await.unwrap(),
        Some(LinkedPremisEvent {
            event: embedded.clone(),
            intellectual_object_identifier: Some(o.identifier),
        })
    );
    assert_eq!(
        stores.events.linked_revision(embedded.identifier).await.unwrap(),
        Some(RevisionRef { identifier: o.identifier, revision_number: 1 })
    );

    // gone with its object
    assert!(stores.catalog.delete(o.identifier).await.unwrap());
    assert_eq!(stores.events.get(embedded.identifier).await.unwrap(), None);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_standalone_events_stay_out_of_object_tree(#[case] backend: Backend) {
    let stores = stores(backend).await;
    let o = object(Uuid::new_v4(), "types:monograph", 1, 0);
    stores.catalog.add(&o).await.unwrap();

    stores.events.add(&linked_event(Some(o.identifier))).await.unwrap();
    let mut audit = LinkedPremisEvent {
        event: event("event:deaccession-review"),
        intellectual_object_identifier: Some(o.identifier),
    };
    audit.event.outcome = "deferred".to_string();
    stores.events.add(&audit).await.unwrap();

    let loaded = stores.catalog.get(o.identifier).await.unwrap().unwrap();
    assert_eq!(loaded.premis_events, o.premis_events);
    assert_eq!(stores.events.get(audit.event.identifier).await.unwrap(), Some(audit));
}

#[test]
fn test_blocking_add_and_get() {
    tokio_test::block_on(async {
        let stores = stores(Backend::Memory).await;
        let standalone = linked_event(None);
        stores.events.add(&standalone).await.unwrap();
        assert!(stores.events.get(standalone.event.identifier).await.unwrap().is_some());
    });
}
