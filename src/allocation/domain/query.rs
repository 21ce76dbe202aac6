//! Listing filters and pagination.

use super::{
    AllocationAction, AllocationLogEntry, CustomerId, PlanId, Port, PortDomainError, PortId,
    PortStatus,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Largest page size accepted by listing operations.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Page size used when callers do not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Validated 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    /// Creates a page request.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::InvalidPageRequest`] when `page` is zero or
    /// `page_size` is outside `1..=MAX_PAGE_SIZE`.
    pub const fn new(page: u64, page_size: u64) -> Result<Self, PortDomainError> {
        if page == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PortDomainError::InvalidPageRequest {
                page,
                page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(Self { page, page_size })
    }

    /// Returns the 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Returns the number of rows preceding this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Cuts this page out of an already ordered, fully filtered sequence.
    #[must_use]
    pub fn slice<T>(&self, ordered: Vec<T>) -> Page<T> {
        let total = u64::try_from(ordered.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let items = ordered.into_iter().skip(skip).take(take).collect();
        Page::new(items, total, *self)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    items: Vec<T>,
    total: u64,
    page: u64,
    page_size: u64,
}

impl<T> Page<T> {
    /// Creates a page.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Returns the rows on this page.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the page, yielding its rows.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Returns the number of rows matching the filter across all pages.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Returns the 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Returns the number of pages needed for `total` rows.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    /// Maps the rows while keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Normalises a search term: trimmed, lowercased, blank dropped.
fn normalize_search(search: impl Into<String>) -> Option<String> {
    let lowered = search.into().trim().to_lowercase();
    (!lowered.is_empty()).then_some(lowered)
}

/// Filter for port listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortFilter {
    status: Option<PortStatus>,
    search: Option<String>,
}

impl PortFilter {
    /// Creates a filter matching every port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the listing to one status.
    #[must_use]
    pub const fn with_status(mut self, status: PortStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the listing to ports whose URL, host, database name or
    /// notes contain `search`, ignoring case.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = normalize_search(search);
        self
    }

    /// Returns the status restriction.
    #[must_use]
    pub const fn status(&self) -> Option<PortStatus> {
        self.status
    }

    /// Returns the normalised (lowercased) search term.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Returns whether `port` satisfies the filter.
    #[must_use]
    pub fn matches(&self, port: &Port) -> bool {
        let status_ok = self.status.is_none_or(|status| port.status() == status);
        let search_ok = self
            .search
            .as_deref()
            .is_none_or(|needle| port.details().matches_search(needle));
        status_ok && search_ok
    }
}

/// Filter for allocation log queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    action: Option<AllocationAction>,
    plan_id: Option<PlanId>,
    customer_id: Option<CustomerId>,
    port_id: Option<PortId>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    search: Option<String>,
}

impl LogFilter {
    /// Creates a filter matching every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to one action.
    #[must_use]
    pub const fn with_action(mut self, action: AllocationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Restricts results to one plan.
    #[must_use]
    pub const fn with_plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    /// Restricts results to one customer.
    #[must_use]
    pub const fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Restricts results to one port.
    #[must_use]
    pub const fn with_port(mut self, port_id: PortId) -> Self {
        self.port_id = Some(port_id);
        self
    }

    /// Keeps entries recorded on or after `date` (UTC).
    #[must_use]
    pub const fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    /// Keeps entries recorded on or before `date` (UTC).
    #[must_use]
    pub const fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    /// Keeps entries whose notes or port URL contain `search`, ignoring
    /// case.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = normalize_search(search);
        self
    }

    /// Returns the action restriction.
    #[must_use]
    pub const fn action(&self) -> Option<AllocationAction> {
        self.action
    }

    /// Returns the plan restriction.
    #[must_use]
    pub const fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    /// Returns the customer restriction.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the port restriction.
    #[must_use]
    pub const fn port_id(&self) -> Option<PortId> {
        self.port_id
    }

    /// Returns the normalised (lowercased) search term.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Returns the inclusive lower timestamp bound.
    #[must_use]
    pub fn recorded_from(&self) -> Option<DateTime<Utc>> {
        self.date_from.map(start_of_day)
    }

    /// Returns the exclusive upper timestamp bound (midnight after
    /// `date_to`). The last representable date has no following midnight,
    /// so it leaves the range open.
    #[must_use]
    pub fn recorded_before(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|date| date.checked_add_days(Days::new(1)))
            .map(start_of_day)
    }

    /// Returns whether `entry` satisfies the filter. `port_url` is the
    /// current URL of the referenced port, when it still exists.
    #[must_use]
    pub fn matches(&self, entry: &AllocationLogEntry, port_url: Option<&str>) -> bool {
        let action_ok = self.action.is_none_or(|action| entry.action() == action);
        let plan_ok = self.plan_id.is_none_or(|plan| entry.plan_id() == Some(plan));
        let customer_ok = self
            .customer_id
            .is_none_or(|customer| entry.customer_id() == Some(customer));
        let port_ok = self.port_id.is_none_or(|port| entry.port_id() == Some(port));
        let from_ok = self
            .recorded_from()
            .is_none_or(|from| entry.created_at() >= from);
        let to_ok = self
            .recorded_before()
            .is_none_or(|before| entry.created_at() < before);
        let search_ok = self.search.as_deref().is_none_or(|needle| {
            [entry.notes(), port_url]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(needle))
        });
        action_ok && plan_ok && customer_ok && port_ok && from_ok && to_ok && search_ok
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
