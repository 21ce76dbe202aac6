//! Versioned transitions and their log rows in the `PostgreSQL` store.

use crate::postgres::helpers::{Harness, harness};
use karyalay_ports::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, InstanceUrl, LogFilter, PageRequest,
        PersistedLogEntryData, Port, PortDetails, PortStatus, PortTransition, Principal,
        SubscriptionId,
    },
    ports::{PortStore, PortStoreError},
};
use mockable::Clock;
use rstest::rstest;

fn assignment(harness: &Harness, port: &Port, subscription_id: SubscriptionId) -> PortTransition {
    let mut next = port.clone();
    let action = next
        .assign(subscription_id, harness.clock.as_ref())
        .expect("available port should accept assignment");
    let entry = AllocationLogEntry::new(action, next.id(), harness.admin, harness.clock.as_ref());
    PortTransition::new(next, port.version(), entry)
}

#[rstest]
fn stale_transition_is_rejected_without_a_log_row(harness: Harness) {
    let loaded = harness.port("https://tenant-01.karyalay.test");
    let winner = SubscriptionId::new();

    harness
        .block_on(harness.store.commit_transition(&assignment(&harness, &loaded, winner)))
        .expect("first commit should succeed");
    let result = harness.block_on(
        harness
            .store
            .commit_transition(&assignment(&harness, &loaded, SubscriptionId::new())),
    );

    assert!(
        matches!(
            result,
            Err(PortStoreError::StaleVersion { port_id, expected })
                if port_id == loaded.id() && expected == loaded.version()
        ),
        "expected StaleVersion, got {result:?}"
    );
    let stored = harness
        .block_on(harness.store.find_port(loaded.id()))
        .expect("lookup should succeed")
        .expect("port should exist");
    assert_eq!(stored.assigned_subscription_id(), Some(winner));
    assert_eq!(stored.version(), loaded.version() + 1);
    assert_eq!(harness.log_rows(loaded.id()), 2);
}

#[rstest]
fn transition_on_a_missing_port_reports_not_found(harness: Harness) {
    let never_stored = Port::new(
        PortDetails::new(InstanceUrl::new("https://ghost.karyalay.test").expect("valid URL")),
        harness.clock.as_ref(),
    );

    let result = harness.block_on(
        harness
            .store
            .commit_transition(&assignment(&harness, &never_stored, SubscriptionId::new())),
    );

    assert!(
        matches!(result, Err(PortStoreError::NotFound(id)) if id == never_stored.id()),
        "expected NotFound, got {result:?}"
    );
    assert_eq!(harness.log_rows(never_stored.id()), 0);
}

#[rstest]
#[case::stale(false)]
#[case::missing(true)]
fn delete_distinguishes_missing_from_stale(harness: Harness, #[case] delete_first: bool) {
    let port = harness.port("https://tenant-02.karyalay.test");
    if delete_first {
        harness
            .block_on(harness.store.delete_port(port.id(), port.version()))
            .expect("first delete should succeed");
    }

    let result = harness.block_on(harness.store.delete_port(port.id(), port.version() + 7));

    if delete_first {
        assert!(matches!(result, Err(PortStoreError::NotFound(id)) if id == port.id()));
    } else {
        assert!(matches!(result, Err(PortStoreError::StaleVersion { .. })));
        assert!(
            harness
                .block_on(harness.store.find_port(port.id()))
                .expect("lookup should succeed")
                .is_some()
        );
    }
}

#[rstest]
fn failed_log_insert_rolls_back_the_port_update(harness: Harness) {
    let port = harness.port("https://tenant-03.karyalay.test");
    let created = harness
        .block_on(harness.store.query_log(&LogFilter::new(), PageRequest::default()))
        .expect("log query should succeed")
        .into_items()
        .into_iter()
        .next()
        .expect("creation should be logged");
    let transition = assignment(&harness, &port, SubscriptionId::new());
    let reused_id = AllocationLogEntry::from_persisted(PersistedLogEntryData {
        id: created.id(),
        action: AllocationAction::Assigned,
        port_id: Some(port.id()),
        customer_id: None,
        subscription_id: transition.port().assigned_subscription_id(),
        plan_id: None,
        performed_by: None,
        notes: None,
        created_at: created.created_at(),
    });
    let clashing = PortTransition::new(transition.into_port(), port.version(), reused_id);

    let result = harness.block_on(harness.store.commit_transition(&clashing));

    assert!(
        matches!(result, Err(PortStoreError::DuplicateLogEntry(id)) if id == created.id()),
        "expected DuplicateLogEntry, got {result:?}"
    );
    let stored = harness
        .block_on(harness.store.find_port(port.id()))
        .expect("lookup should succeed")
        .expect("port should exist");
    assert_eq!(stored.status(), PortStatus::Available);
    assert_eq!(stored.version(), port.version());
    assert_eq!(harness.log_rows(port.id()), 1);
}

#[rstest]
fn lifecycle_round_trip_persists_every_field(harness: Harness) {
    let subscription = harness.subscription("Acme Ltd", "Business");
    let port = harness.port("https://tenant-04.karyalay.test");

    let assigned = harness
        .block_on(harness.allocation.assign(
            port.id(),
            subscription.id(),
            harness.admin,
            Some("first tenant".to_owned()),
        ))
        .expect("assignment should succeed");
    let released = harness
        .block_on(harness.allocation.release(port.id(), Principal::System, None))
        .expect("release should succeed");

    let stored = harness
        .block_on(harness.store.find_port(port.id()))
        .expect("lookup should succeed")
        .expect("port should exist");
    assert_eq!(stored, released);
    assert_eq!(stored.last_subscription_id(), Some(subscription.id()));
    assert_eq!(assigned.assigned_at(), Some(harness.clock.utc()));
    assert_eq!(harness.log_rows(port.id()), 3);
}
