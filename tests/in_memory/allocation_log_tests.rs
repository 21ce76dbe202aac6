//! In-memory integration tests for allocation history queries.

use super::helpers::{Pool, pool};
use chrono::NaiveDate;
use karyalay_ports::allocation::domain::{
    AllocationAction, LogFilter, PageRequest, ResolvedRef,
};
use rstest::rstest;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Assigns and releases three ports, leaving six transition entries.
async fn churned_pool(pool: &Pool) {
    for index in 1..=3 {
        let port = pool
            .port(&format!("https://tenant-{index}.karyalay.test"))
            .await;
        let subscription = pool.subscription(&format!("Customer {index}"), "Business");
        pool.allocation
            .assign(
                port.id(),
                subscription.id(),
                pool.admin,
                Some(format!("signup {index}")),
            )
            .await
            .expect("assign should succeed");
        pool.allocation
            .release(port.id(), pool.admin, None)
            .await
            .expect("release should succeed");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn action_and_date_filter_returns_newest_first(pool: Pool) {
    churned_pool(&pool).await;

    let page = pool
        .log
        .query(
            &LogFilter::new()
                .with_action(AllocationAction::Assigned)
                .with_date_from(date(2024, 1, 1)),
            PageRequest::default(),
        )
        .await
        .expect("log query should succeed");

    let notes: Vec<Option<&str>> = page.items().iter().map(|view| view.entry.notes()).collect();
    assert_eq!(
        notes,
        vec![Some("signup 3"), Some("signup 2"), Some("signup 1")]
    );
    assert!(
        page.items()
            .iter()
            .all(|view| view.entry.action() == AllocationAction::Assigned)
    );
    let timestamps: Vec<_> = page
        .items()
        .iter()
        .map(|view| view.entry.created_at())
        .collect();
    assert!(timestamps.windows(2).all(|pair| match pair {
        [newer, older] => newer >= older,
        _ => true,
    }));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn date_range_before_any_activity_is_empty(pool: Pool) {
    churned_pool(&pool).await;

    let page = pool
        .log
        .query(
            &LogFilter::new().with_date_to(date(2023, 12, 31)),
            PageRequest::default(),
        )
        .await
        .expect("log query should succeed");

    assert_eq!(page.total(), 0);
    assert!(page.items().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn search_matches_port_url_and_notes(pool: Pool) {
    churned_pool(&pool).await;

    let by_url = pool
        .log
        .query(&LogFilter::new().with_search("TENANT-2"), PageRequest::default())
        .await
        .expect("log query should succeed");
    let by_notes = pool
        .log
        .query(&LogFilter::new().with_search("signup 3"), PageRequest::default())
        .await
        .expect("log query should succeed");

    assert_eq!(by_url.total(), 3);
    assert_eq!(by_notes.total(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn entries_are_paged_with_totals(pool: Pool) {
    churned_pool(&pool).await;

    let second_page = pool
        .log
        .query(
            &LogFilter::new(),
            PageRequest::new(2, 4).expect("valid page"),
        )
        .await
        .expect("log query should succeed");

    assert_eq!(second_page.total(), 9);
    assert_eq!(second_page.total_pages(), 3);
    assert_eq!(second_page.items().len(), 4);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn views_resolve_current_names(pool: Pool) {
    let port = pool.port("https://tenant-1.karyalay.test").await;
    let subscription = pool.subscription("Acme Ltd", "Business");
    pool.allocation
        .assign(port.id(), subscription.id(), pool.admin, None)
        .await
        .expect("assign should succeed");

    let page = pool
        .log
        .query(
            &LogFilter::new().with_customer(
                subscription.customer_id().expect("customer recorded"),
            ),
            PageRequest::default(),
        )
        .await
        .expect("log query should succeed");

    let view = page.items().first().expect("assignment entry present");
    assert_eq!(view.customer.to_string(), "Acme Ltd");
    assert_eq!(view.plan.to_string(), "Business");
    assert!(matches!(&view.port, ResolvedRef::Present { id, .. } if *id == port.id()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn recorded_actions_are_listed_once(pool: Pool) {
    churned_pool(&pool).await;

    let actions = pool
        .log
        .distinct_actions()
        .await
        .expect("actions should load");

    assert_eq!(
        actions.into_iter().collect::<Vec<_>>(),
        vec![
            AllocationAction::Assigned,
            AllocationAction::Released,
            AllocationAction::Created,
        ]
    );
}
