use super::facets::{FacetCountAggregator, FacetQuery, FacetTicket};
use super::pager::{PageTicket, ResultPager};
use super::sentinel::{ScrollMetrics, ScrollSentinel};
use super::sort::SortReconciler;
use super::store::FilterStore;
use super::view_mode::{MapQuery, MapStatus, MapTicket, ViewAction, ViewMode, ViewModeController};
use super::Resolution;
use crate::api::{ListingsApi, ListingsRequest, RequestPurpose};
use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::filters::{FilterCodec, FilterCriteria, SortOrder};
use crate::models::PageEnvelope;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A request handed out by one of the components.
enum Work {
    Page(PageTicket, ListingsRequest),
    Facet(FacetQuery),
    Map(MapQuery),
}

/// A response on its way back to the component that asked for it.
enum Completion {
    Page(PageTicket, Result<PageEnvelope>),
    Facet(FacetTicket, Result<PageEnvelope>),
    Map(MapTicket, Result<PageEnvelope>),
}

/// What happened to one response once it reached its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub purpose: RequestPurpose,
    pub resolution: Resolution,
}

/// Owning context for one discovery screen.
///
/// Holds the canonical filters and every component that consumes them. All
/// filter changes, user edits and sort replays alike, go through
/// [`apply_filters`](Self::apply_filters).
///
/// Operations only queue requests and return. Responses are handed to their
/// components one at a time by [`next_delivery`](Self::next_delivery), so a
/// slow facet count never holds up the list and filters can change while
/// requests are still out. A response whose state moved on in the meantime is
/// delivered as [`Resolution::Superseded`].
pub struct DiscoverySession<A: ListingsApi + 'static> {
    api: Arc<A>,
    config: DiscoveryConfig,
    store: FilterStore,
    /// Filters the pager's current sequence was started with.
    pager_criteria: Arc<FilterCriteria>,
    pager: ResultPager,
    facets: FacetCountAggregator,
    sort: SortReconciler,
    view: ViewModeController,
    sentinel: ScrollSentinel,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl<A: ListingsApi + 'static> DiscoverySession<A> {
    /// Create a session whose initial filters are decoded from `query`.
    pub fn new(api: A, config: DiscoveryConfig, query: &str) -> Self {
        Self::with_shared_api(Arc::new(api), config, query)
    }

    pub fn with_shared_api(api: Arc<A>, config: DiscoveryConfig, query: &str) -> Self {
        Self::from_criteria(api, config, FilterCodec::decode(query))
    }

    /// Create a session starting from already-built filters.
    pub fn from_criteria(api: Arc<A>, config: DiscoveryConfig, criteria: FilterCriteria) -> Self {
        let store = FilterStore::new(criteria);
        Self {
            pager_criteria: store.snapshot(),
            store,
            pager: ResultPager::new(),
            facets: FacetCountAggregator::new(config.room_facets.clone(), config.facet_per_page),
            sort: SortReconciler::new(),
            view: ViewModeController::new(config.map_per_page),
            sentinel: ScrollSentinel::new(config.scroll.threshold_px, config.scroll.min_interval()),
            in_flight: FuturesUnordered::new(),
            api,
            config,
        }
    }

    pub fn criteria(&self) -> Arc<FilterCriteria> {
        self.store.snapshot()
    }

    /// Canonical shareable query string for the current filters.
    pub fn query_string(&self) -> String {
        self.store.query_string()
    }

    pub fn filter_version(&self) -> u64 {
        self.store.version()
    }

    pub fn pager(&self) -> &ResultPager {
        &self.pager
    }

    pub fn facets(&self) -> &FacetCountAggregator {
        &self.facets
    }

    pub fn view(&self) -> &ViewModeController {
        &self.view
    }

    pub fn mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// How many times the list sequence has been (re)started.
    pub fn resets(&self) -> u64 {
        self.pager.generation()
    }

    /// Requests sent whose responses have not been delivered yet.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Initial load: first page (or map) plus every facet.
    pub fn start(&mut self) {
        let current = self.store.snapshot();
        info!(
            source = self.api.source_name(),
            mode = %self.view.mode(),
            "Starting discovery for {}",
            current.identity()
        );
        self.sort.observe(current.sort);
        let work = self.plan(&current);
        self.dispatch(work);
    }

    /// Replace the filters with `criteria` and bring every consumer up to date.
    ///
    /// This is the only path that starts new searches. Applying a value equal
    /// to the current one issues no requests.
    pub fn apply_filters(&mut self, criteria: FilterCriteria) {
        self.store.replace(criteria);
        let current = self.store.snapshot();
        self.sort.acknowledge(current.sort);
        let work = self.plan(&current);
        self.dispatch(work);
    }

    /// Change only the sort sub-state, then replay it through the filter path.
    /// Returns whether a replay happened.
    pub fn set_sort(&mut self, sort: SortOrder) -> bool {
        let next = self.store.snapshot().with_sort(sort);
        self.store.replace(next);
        self.reconcile_sort()
    }

    /// Reapply the current filters once if the sort changed since it was last seen.
    pub fn reconcile_sort(&mut self) -> bool {
        let current = self.store.snapshot();
        if !self.sort.observe(current.sort) {
            return false;
        }
        info!("Replaying filters for sort {}", current.sort);
        self.apply_filters((*current).clone());
        true
    }

    /// Request the next list page, if the pager accepts one.
    pub fn fetch_next(&mut self) -> bool {
        if self.view.mode() != ViewMode::List {
            return false;
        }
        match self.pager.request_next() {
            Some(ticket) => {
                let work = self.page_work(ticket);
                self.dispatch(vec![work]);
                true
            }
            None => false,
        }
    }

    /// Retry whatever failed: the list request and any failed facet counts.
    pub fn retry(&mut self) -> bool {
        let mut work: Vec<Work> = self
            .facets
            .retry_failed()
            .into_iter()
            .map(Work::Facet)
            .collect();
        if let Some(ticket) = self.pager.retry() {
            work.push(self.page_work(ticket));
        }
        let retried = !work.is_empty();
        self.dispatch(work);
        retried
    }

    /// Feed a scroll position to the sentinel; requests the next page on a signal.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> bool {
        if self.view.mode() != ViewMode::List {
            return false;
        }
        if !self.sentinel.observe(metrics, &self.pager, now) {
            return false;
        }
        self.fetch_next()
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        let current = self.store.snapshot();
        let work = match self.view.set_mode(mode, &current, &self.pager) {
            ViewAction::None => Vec::new(),
            ViewAction::FetchMap(query) => vec![Work::Map(query)],
            ViewAction::LoadList => {
                let ticket = self
                    .sync_pager(&current)
                    .or_else(|| self.pager.retry());
                ticket.map(|t| self.page_work(t)).into_iter().collect()
            }
        };
        self.dispatch(work);
    }

    /// Wait for the next response and hand it to its component.
    /// Returns `None` when nothing is in flight.
    ///
    /// Cancel-safe: dropping the future before it completes loses no response.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        let done = self.in_flight.next().await?;
        Some(self.complete(done))
    }

    /// Deliver responses until the listings of the current view are settled.
    /// Facet counts still in flight stay queued.
    pub async fn wait_for_results(&mut self) {
        while self.results_loading() {
            if self.next_delivery().await.is_none() {
                break;
            }
        }
    }

    /// Deliver every outstanding response.
    pub async fn settle(&mut self) {
        while self.next_delivery().await.is_some() {}
    }

    fn results_loading(&self) -> bool {
        match self.view.mode() {
            ViewMode::List => self.pager.state().is_loading(),
            ViewMode::Map => matches!(self.view.map_status(), MapStatus::Loading),
        }
    }

    fn plan(&mut self, current: &Arc<FilterCriteria>) -> Vec<Work> {
        let mut work = Vec::new();

        match self.view.mode() {
            ViewMode::List => {
                if let Some(ticket) = self.sync_pager(current) {
                    work.push(self.page_work(ticket));
                }
            }
            ViewMode::Map => {
                if let Some(query) = self.view.refresh_map(current) {
                    work.push(Work::Map(query));
                }
            }
        }

        work.extend(self.facets.sync(&current.search).into_iter().map(Work::Facet));
        work
    }

    fn sync_pager(&mut self, current: &Arc<FilterCriteria>) -> Option<PageTicket> {
        let ticket = self.pager.sync(&current.identity())?;
        self.pager_criteria = Arc::clone(current);
        self.sentinel.reset();
        Some(ticket)
    }

    fn page_work(&self, ticket: PageTicket) -> Work {
        let request = ListingsRequest::list(
            (*self.pager_criteria).clone(),
            ticket.page(),
            self.config.per_page,
        );
        Work::Page(ticket, request)
    }

    /// Send every request without waiting for any of them.
    fn dispatch(&mut self, work: Vec<Work>) {
        if work.is_empty() {
            return;
        }
        debug!(in_flight = self.in_flight.len(), "Dispatching {} requests", work.len());
        for item in work {
            self.in_flight
                .push(Self::perform(Arc::clone(&self.api), item).boxed());
        }
    }

    async fn perform(api: Arc<A>, work: Work) -> Completion {
        match work {
            Work::Page(ticket, request) => Completion::Page(ticket, api.fetch_page(&request).await),
            Work::Facet(query) => {
                Completion::Facet(query.ticket, api.fetch_page(&query.request).await)
            }
            Work::Map(query) => Completion::Map(query.ticket, api.fetch_page(&query.request).await),
        }
    }

    fn complete(&mut self, done: Completion) -> Delivery {
        let (purpose, resolution) = match done {
            Completion::Page(ticket, result) => {
                (RequestPurpose::List, self.pager.resolve(&ticket, result))
            }
            Completion::Facet(ticket, result) => {
                (RequestPurpose::Facet, self.facets.resolve(ticket, result))
            }
            Completion::Map(ticket, result) => {
                (RequestPurpose::Map, self.view.resolve_map(&ticket, result))
            }
        };
        Delivery { purpose, resolution }
    }
}
