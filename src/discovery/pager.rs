//! Accumulated page sequence for infinite scroll.
//!
//! # State Machine
//!
//! ```text
//!   idle ──sync(new identity)──► loading-first ──ok──► ready ◄──ok (more pages)──┐
//!                                     │   └──ok (last page)──► exhausted        │
//!                                     └─err──► error                            │
//!   ready ──request_next()──► loading-more ─────────────────────────────────────┘
//!   loading-more ──ok (last page)──► exhausted
//!   loading-more ──err──► error (pages kept)
//!   error ──retry()──► loading-first | loading-more
//!   any ──sync(new identity)──► loading-first (pages dropped)
//! ```
//!
//! Every request carries a [`PageTicket`]. A response is applied only if its
//! ticket is the one outstanding for the current generation; anything else was
//! superseded by a reset and is dropped on arrival.

use super::Resolution;
use crate::error::Result;
use crate::filters::QueryIdentity;
use crate::models::{Page, PageEnvelope, PropertySummary};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Idle,
    LoadingFirst,
    LoadingMore,
    Ready,
    Exhausted,
    Error,
}

impl PagerState {
    pub fn is_loading(&self) -> bool {
        matches!(self, PagerState::LoadingFirst | PagerState::LoadingMore)
    }

    /// Ready or exhausted: the current identity has a usable result.
    pub fn is_settled(&self) -> bool {
        matches!(self, PagerState::Ready | PagerState::Exhausted)
    }
}

/// Tag for one outstanding page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    identity: QueryIdentity,
    page: u32,
}

impl PageTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn identity(&self) -> &QueryIdentity {
        &self.identity
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

#[derive(Debug, Clone)]
pub struct ResultPager {
    identity: Option<QueryIdentity>,
    generation: u64,
    state: PagerState,
    pages: Vec<Page>,
    total: u64,
    has_more: bool,
    in_flight: Option<PageTicket>,
    failed_page: Option<u32>,
    last_error: Option<String>,
    /// Responses applied for the current generation (success or failure).
    settled: u64,
}

impl Default for ResultPager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPager {
    pub fn new() -> Self {
        Self {
            identity: None,
            generation: 0,
            state: PagerState::Idle,
            pages: Vec::new(),
            total: 0,
            has_more: false,
            in_flight: None,
            failed_page: None,
            last_error: None,
            settled: 0,
        }
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    pub fn identity(&self) -> Option<&QueryIdentity> {
        self.identity.as_ref()
    }

    /// Bumped on every reset; counts how many sequences were started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Flattened items across all pages, in page order.
    pub fn items(&self) -> impl Iterator<Item = &PropertySummary> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    /// Total matching listings as last reported by the server.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn in_flight(&self) -> Option<&PageTicket> {
        self.in_flight.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn settled_fetches(&self) -> u64 {
        self.settled
    }

    /// Whether the current state and identity already match `identity`.
    pub fn is_current(&self, identity: &QueryIdentity) -> bool {
        self.identity.as_ref() == Some(identity)
    }

    /// Whether a "fetch next" signal would start a request right now.
    pub fn can_request_next(&self) -> bool {
        match self.state {
            PagerState::Ready => self.has_more && self.in_flight.is_none(),
            PagerState::Error => !self.pages.is_empty(),
            _ => false,
        }
    }

    /// Compare against the current identity by value and reset when it differs.
    pub fn sync(&mut self, identity: &QueryIdentity) -> Option<PageTicket> {
        if self.is_current(identity) {
            return None;
        }
        Some(self.reset(identity.clone()))
    }

    /// Drop everything accumulated and start a new sequence at page 1.
    pub fn reset(&mut self, identity: QueryIdentity) -> PageTicket {
        if let Some(stale) = &self.in_flight {
            debug!(page = stale.page, "Abandoning in-flight request for {}", stale.identity);
        }

        self.generation += 1;
        self.pages.clear();
        self.total = 0;
        self.has_more = false;
        self.failed_page = None;
        self.last_error = None;
        self.settled = 0;
        self.identity = Some(identity);
        self.state = PagerState::LoadingFirst;

        info!(generation = self.generation, "Pager reset for {}", self.current_identity());
        self.issue(1)
    }

    /// Start loading the next page if one exists and nothing is outstanding.
    ///
    /// After a failed "more" fetch this re-issues the failed page, so the same
    /// trigger that failed can simply be repeated.
    pub fn request_next(&mut self) -> Option<PageTicket> {
        match self.state {
            PagerState::Ready if self.has_more && self.in_flight.is_none() => {
                let next = self.pages.last().map(|p| p.index + 1).unwrap_or(1);
                self.state = PagerState::LoadingMore;
                Some(self.issue(next))
            }
            PagerState::Error if !self.pages.is_empty() => self.retry(),
            _ => None,
        }
    }

    /// Re-issue the request that failed, without discarding anything.
    pub fn retry(&mut self) -> Option<PageTicket> {
        if self.state != PagerState::Error || self.identity.is_none() {
            return None;
        }
        let page = self.failed_page.unwrap_or(1);
        self.state = if self.pages.is_empty() {
            PagerState::LoadingFirst
        } else {
            PagerState::LoadingMore
        };
        self.last_error = None;
        debug!(page, "Retrying page for {}", self.current_identity());
        Some(self.issue(page))
    }

    /// Apply a response, unless its ticket has been superseded.
    pub fn resolve(&mut self, ticket: &PageTicket, result: Result<PageEnvelope>) -> Resolution {
        if self.in_flight.as_ref() != Some(ticket) {
            debug!(
                page = ticket.page,
                generation = ticket.generation,
                "Discarding superseded page response for {}",
                ticket.identity
            );
            return Resolution::Superseded;
        }
        self.in_flight = None;
        self.settled += 1;

        match result {
            Ok(envelope) => {
                let page = Page::from_envelope(ticket.page, envelope);
                self.total = page.total;
                self.has_more = page.has_next;
                self.failed_page = None;
                debug!(
                    page = page.index,
                    items = page.len(),
                    total = self.total,
                    has_more = self.has_more,
                    "Appending page"
                );
                self.pages.push(page);
                self.state = if self.has_more {
                    PagerState::Ready
                } else {
                    PagerState::Exhausted
                };
            }
            Err(e) => {
                warn!(page = ticket.page, "Page fetch failed: {}", e);
                self.failed_page = Some(ticket.page);
                self.last_error = Some(e.to_string());
                self.state = PagerState::Error;
            }
        }
        Resolution::Applied
    }

    fn issue(&mut self, page: u32) -> PageTicket {
        let ticket = PageTicket {
            generation: self.generation,
            identity: self.identity.clone().unwrap_or_default(),
            page,
        };
        self.in_flight = Some(ticket.clone());
        ticket
    }

    fn current_identity(&self) -> String {
        self.identity
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }
}
