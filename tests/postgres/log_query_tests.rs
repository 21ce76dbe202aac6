//! Allocation log ordering, filters and reference resolution in `PostgreSQL`.

use crate::postgres::helpers::{Harness, harness};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use karyalay_ports::allocation::{
    domain::{AllocationAction, AllocationLogView, LogFilter, PageRequest, PortId},
    ports::PortStore,
};
use rstest::rstest;
use std::collections::BTreeSet;

fn instant(year: i32, month: u32, day: u32, hms: (u32, u32, u32)) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hms.0, hms.1, hms.2)
        .single()
        .expect("valid timestamp")
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn query(harness: &Harness, filter: &LogFilter) -> Vec<AllocationLogView> {
    harness
        .block_on(
            harness
                .log
                .query(filter, PageRequest::new(1, 100).expect("valid page")),
        )
        .expect("log query should succeed")
        .into_items()
}

fn port_ids(views: &[AllocationLogView]) -> Vec<PortId> {
    views
        .iter()
        .filter_map(|view| view.entry.port_id())
        .collect()
}

#[rstest]
fn entries_sharing_a_timestamp_come_back_newest_insert_first(harness: Harness) {
    let created: Vec<_> = ["one", "two", "three"]
        .iter()
        .map(|name| harness.port(&format!("https://{name}.karyalay.test")).id())
        .collect();

    let listed = port_ids(&query(&harness, &LogFilter::new()));

    assert_eq!(listed, created.into_iter().rev().collect::<Vec<_>>());
}

#[rstest]
fn paging_walks_the_log_without_overlap(harness: Harness) {
    for index in 0..5 {
        harness.port(&format!("https://tenant-{index}.karyalay.test"));
    }
    let page = |number| {
        harness
            .block_on(
                harness
                    .store
                    .query_log(&LogFilter::new(), PageRequest::new(number, 2).expect("valid page")),
            )
            .expect("log query should succeed")
    };

    let pages: Vec<_> = (1..=3).map(page).collect();

    let seen: BTreeSet<_> = pages
        .iter()
        .flat_map(|page| page.items().iter().map(|entry| entry.id()))
        .collect();
    assert_eq!(seen.len(), 5);
    assert!(pages.iter().all(|page| page.total() == 5));
    assert_eq!(pages.last().map(|page| page.items().len()), Some(1));
}

#[rstest]
#[case::january(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)), &[1, 0])]
#[case::last_day_only(Some(day(2024, 1, 31)), Some(day(2024, 1, 31)), &[1])]
#[case::from_february(Some(day(2024, 2, 1)), None, &[2])]
#[case::open_ended_through_max(None, Some(NaiveDate::MAX), &[2, 1, 0])]
fn date_filters_cover_whole_utc_days(
    harness: Harness,
    #[case] from: Option<NaiveDate>,
    #[case] to: Option<NaiveDate>,
    #[case] expected: &[usize],
) {
    let stamps = [
        instant(2024, 1, 1, (0, 0, 0)),
        instant(2024, 1, 31, (23, 59, 59)),
        instant(2024, 2, 1, (0, 0, 0)),
    ];
    let ports: Vec<_> = stamps
        .iter()
        .enumerate()
        .map(|(index, stamp)| {
            harness.clock.set(*stamp);
            harness.port(&format!("https://dated-{index}.karyalay.test")).id()
        })
        .collect();
    let mut filter = LogFilter::new();
    if let Some(date) = from {
        filter = filter.with_date_from(date);
    }
    if let Some(date) = to {
        filter = filter.with_date_to(date);
    }

    let listed = port_ids(&query(&harness, &filter));

    let wanted: Vec<_> = expected
        .iter()
        .filter_map(|index| ports.get(*index).copied())
        .collect();
    assert_eq!(listed, wanted);
}

#[rstest]
fn search_matches_current_port_urls_and_notes(harness: Harness) {
    let literal = harness.port("https://Acme-100%.karyalay.test");
    let lookalike = harness.port("https://acme-1000.karyalay.test");
    let globex = harness.port("https://globex.karyalay.test");
    let subscription = harness.subscription("Globex Corp", "Enterprise");
    harness
        .block_on(harness.allocation.assign(
            globex.id(),
            subscription.id(),
            harness.admin,
            Some("Moved over from ACME".to_owned()),
        ))
        .expect("assignment should succeed");

    let by_name = query(&harness, &LogFilter::new().with_search("acme"));
    let by_percent = query(&harness, &LogFilter::new().with_search("100%"));

    assert_eq!(
        port_ids(&by_name),
        vec![globex.id(), lookalike.id(), literal.id()]
    );
    assert_eq!(port_ids(&by_percent), vec![literal.id()]);
    let assigned = by_name.first().expect("assignment entry should match");
    assert_eq!(assigned.customer.value().map(String::as_str), Some("Globex Corp"));
    assert_eq!(assigned.plan.value().map(String::as_str), Some("Enterprise"));
}

#[rstest]
fn deleted_ports_drop_out_of_url_search_but_keep_their_history(harness: Harness) {
    let kept = harness.port("https://acme-eu.karyalay.test");
    let removed = harness.port("https://acme-us.karyalay.test");
    harness
        .block_on(harness.registry.delete(removed.id(), harness.admin))
        .expect("delete should succeed");

    let by_url = query(&harness, &LogFilter::new().with_search("acme"));
    let history = query(&harness, &LogFilter::new().with_port(removed.id()));

    assert_eq!(port_ids(&by_url), vec![kept.id()]);
    let entry = history.first().expect("creation entry should survive");
    assert!(entry.port.is_deleted());
    assert_eq!(entry.port.id(), Some(removed.id()));
}

#[rstest]
fn distinct_actions_and_purge_follow_stored_rows(harness: Harness) {
    let subscription = harness.subscription("Initech", "Starter");
    harness.clock.set(instant(2024, 1, 1, (9, 0, 0)));
    let port = harness.port("https://initech.karyalay.test");
    harness.clock.set(instant(2024, 3, 1, (9, 0, 0)));
    harness
        .block_on(harness.allocation.assign(port.id(), subscription.id(), harness.admin, None))
        .expect("assignment should succeed");
    harness.clock.set(instant(2024, 3, 2, (9, 0, 0)));
    harness
        .block_on(harness.allocation.release(port.id(), harness.admin, None))
        .expect("release should succeed");

    let actions = harness
        .block_on(harness.log.distinct_actions())
        .expect("actions should load");
    let purged = harness
        .block_on(harness.log.purge_before(instant(2024, 2, 1, (0, 0, 0))))
        .expect("purge should succeed");

    assert_eq!(
        actions,
        BTreeSet::from([
            AllocationAction::Created,
            AllocationAction::Assigned,
            AllocationAction::Released,
        ])
    );
    assert_eq!(purged, 1);
    assert_eq!(harness.log_rows(port.id()), 2);
}
