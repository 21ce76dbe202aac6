//! In-memory integration tests for the port registry.

use super::helpers::{Pool, pool};
use karyalay_ports::allocation::{
    domain::{AllocationAction, PageRequest, PortFilter, PortStatus},
    services::{ErrorKind, PortDetailsRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_port_is_available_with_one_entry(pool: Pool) {
    let created = pool.port("https://tenant-01.karyalay.test").await;

    let loaded = pool.reload(&created).await;

    assert_eq!(loaded, created);
    assert_eq!(loaded.status(), PortStatus::Available);
    assert_eq!(pool.history(&created).await, vec![AllocationAction::Created]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn search_and_status_filters_narrow_listing(pool: Pool) {
    let acme = pool
        .registry
        .create(
            PortDetailsRequest::new("https://acme.karyalay.test").with_db_name("acme_main"),
            pool.admin,
        )
        .await
        .expect("create should succeed");
    let globex = pool.port("https://globex.karyalay.test").await;
    pool.allocation
        .reserve(globex.id(), pool.admin, None)
        .await
        .expect("reserve should succeed");

    let by_search = pool
        .registry
        .list(&PortFilter::new().with_search("ACME_MAIN"), PageRequest::default())
        .await
        .expect("listing should succeed");
    let reserved = pool
        .registry
        .list(
            &PortFilter::new().with_status(PortStatus::Reserved),
            PageRequest::default(),
        )
        .await
        .expect("listing should succeed");

    assert_eq!(by_search.total(), 1);
    assert_eq!(by_search.items().first().map(|port| port.id()), Some(acme.id()));
    assert_eq!(reserved.total(), 1);
    assert_eq!(reserved.items().first().map(|port| port.id()), Some(globex.id()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_port_keeps_its_history(pool: Pool) {
    let created = pool.port("https://tenant-02.karyalay.test").await;

    pool.registry
        .delete(created.id(), pool.admin)
        .await
        .expect("delete should succeed");

    let lookup = pool.registry.get(created.id()).await;
    assert!(lookup.is_err_and(|err| err.kind() == ErrorKind::NotFound));
    assert_eq!(pool.history(&created).await, vec![AllocationAction::Created]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn editing_an_assigned_port_keeps_its_assignment(pool: Pool) {
    let created = pool.port("https://tenant-03.karyalay.test").await;
    let subscription = pool.subscription("Initech", "Starter");
    pool.allocation
        .assign(created.id(), subscription.id(), pool.admin, None)
        .await
        .expect("assign should succeed");

    let edited = pool
        .registry
        .update_details(
            created.id(),
            PortDetailsRequest::new("https://tenant-03b.karyalay.test").with_server_region("eu"),
            pool.admin,
        )
        .await
        .expect("edit should succeed");

    assert_eq!(edited.status(), PortStatus::Assigned);
    assert_eq!(edited.assigned_subscription_id(), Some(subscription.id()));
    assert_eq!(
        edited.details().instance_url().as_str(),
        "https://tenant-03b.karyalay.test"
    );
    assert_eq!(
        pool.history(&created).await,
        vec![AllocationAction::Created, AllocationAction::Assigned]
    );
}
