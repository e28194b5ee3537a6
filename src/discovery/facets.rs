use super::Resolution;
use crate::api::ListingsRequest;
use crate::error::Result;
use crate::filters::{RoomSelection, SearchFilters};
use crate::models::PageEnvelope;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Shown while a facet count is still loading.
pub const PLACEHOLDER: &str = "…";
/// Shown when a facet count could not be fetched.
pub const UNAVAILABLE: &str = "–";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetStatus {
    Loading,
    Ready(u64),
    Failed(String),
}

/// Tag for one outstanding facet query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacetTicket {
    base_version: u64,
    value: u8,
}

impl FacetTicket {
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }
}

/// A facet query ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetQuery {
    pub ticket: FacetTicket,
    pub request: ListingsRequest,
}

/// Room-count facets: "how many listings would match with exactly this room
/// bucket", computed with one speculative query per bucket.
///
/// Counts belong to the base filters they were requested for. When the base
/// changes every count goes back to loading and late answers for the old base
/// are dropped.
#[derive(Debug, Clone)]
pub struct FacetCountAggregator {
    values: Vec<u8>,
    per_page: u32,
    base: Option<SearchFilters>,
    base_version: u64,
    counts: BTreeMap<u8, FacetStatus>,
}

impl FacetCountAggregator {
    pub fn new(values: impl IntoIterator<Item = u8>, per_page: u32) -> Self {
        let mut values: Vec<u8> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self {
            values,
            per_page,
            base: None,
            base_version: 0,
            counts: BTreeMap::new(),
        }
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn status(&self, value: u8) -> Option<&FacetStatus> {
        self.counts.get(&value)
    }

    pub fn count(&self, value: u8) -> Option<u64> {
        match self.counts.get(&value) {
            Some(FacetStatus::Ready(count)) => Some(*count),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.counts
            .values()
            .any(|status| matches!(status, FacetStatus::Loading))
    }

    /// Display text for a facet: a placeholder until its own query resolves.
    pub fn label(&self, value: u8) -> String {
        match self.counts.get(&value) {
            Some(FacetStatus::Ready(count)) => count.to_string(),
            Some(FacetStatus::Failed(_)) => UNAVAILABLE.to_string(),
            Some(FacetStatus::Loading) | None => PLACEHOLDER.to_string(),
        }
    }

    /// Reissue every facet query when `base` differs from the last seen base.
    /// Returns an empty list when nothing changed.
    pub fn sync(&mut self, base: &SearchFilters) -> Vec<FacetQuery> {
        if self.base.as_ref() == Some(base) {
            return Vec::new();
        }
        self.base = Some(base.clone());
        self.base_version += 1;
        debug!(version = self.base_version, "Facet base changed, reissuing {} queries", self.values.len());

        let mut queries = Vec::with_capacity(self.values.len());
        for &value in &self.values {
            self.counts.insert(value, FacetStatus::Loading);
            // The base room selection is replaced, not combined, so each count
            // answers "what if this were the only room value selected".
            let search = base.with_rooms(RoomSelection::only(value));
            queries.push(FacetQuery {
                ticket: FacetTicket {
                    base_version: self.base_version,
                    value,
                },
                request: ListingsRequest::facet(search, self.per_page),
            });
        }
        queries
    }

    /// Reissue the queries whose last attempt failed, against the same base.
    pub fn retry_failed(&mut self) -> Vec<FacetQuery> {
        let Some(base) = self.base.clone() else {
            return Vec::new();
        };
        let failed: Vec<u8> = self
            .counts
            .iter()
            .filter(|(_, status)| matches!(status, FacetStatus::Failed(_)))
            .map(|(value, _)| *value)
            .collect();

        failed
            .into_iter()
            .map(|value| {
                self.counts.insert(value, FacetStatus::Loading);
                FacetQuery {
                    ticket: FacetTicket {
                        base_version: self.base_version,
                        value,
                    },
                    request: ListingsRequest::facet(
                        base.with_rooms(RoomSelection::only(value)),
                        self.per_page,
                    ),
                }
            })
            .collect()
    }

    /// Store the count for one facet, unless the base moved on since it was requested.
    pub fn resolve(&mut self, ticket: FacetTicket, result: Result<PageEnvelope>) -> Resolution {
        if ticket.base_version != self.base_version || !self.counts.contains_key(&ticket.value) {
            debug!(value = ticket.value, "Discarding superseded facet count");
            return Resolution::Superseded;
        }

        let status = match result {
            Ok(envelope) => FacetStatus::Ready(envelope.total),
            Err(e) => {
                warn!(value = ticket.value, "Facet count failed: {}", e);
                FacetStatus::Failed(e.to_string())
            }
        };
        self.counts.insert(ticket.value, status);
        Resolution::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;
    use crate::filters::{FilterCodec, RangeFilter};
    use pretty_assertions::assert_eq;

    fn total(total: u64) -> Result<PageEnvelope> {
        Ok(PageEnvelope {
            data: vec![],
            current_page: 1,
            last_page: 1,
            total,
            next_page_url: None,
            per_page: Some(1),
        })
    }

    fn base(query: &str) -> SearchFilters {
        FilterCodec::decode(query).search
    }

    #[test]
    fn one_query_per_value_with_rooms_replaced() {
        let mut facets = FacetCountAggregator::new(1..=5, 1);
        let queries = facets.sync(&base("priceFrom=50000&rooms=2,4&sort=price"));

        assert_eq!(queries.len(), 5);
        for query in &queries {
            let search = &query.request.criteria.search;
            assert_eq!(search.price, RangeFilter::at_least(50_000));
            assert_eq!(search.rooms, RoomSelection::only(query.ticket.value()));
            assert_eq!(query.request.per_page, 1);
        }

        let five = FilterCodec::to_query_string(&queries[4].request.criteria);
        assert_eq!(five, "priceFrom=50000&roomsFrom=5");
    }

    #[test]
    fn placeholders_until_each_facet_resolves() {
        let mut facets = FacetCountAggregator::new(1..=3, 1);
        let queries = facets.sync(&base(""));
        assert_eq!(facets.label(1), PLACEHOLDER);

        facets.resolve(queries[2].ticket, total(7));
        assert_eq!(facets.label(3), "7");
        assert_eq!(facets.label(1), PLACEHOLDER);
        assert!(facets.is_loading());

        facets.resolve(queries[0].ticket, total(12));
        facets.resolve(queries[1].ticket, total(0));
        assert_eq!(facets.count(1), Some(12));
        assert_eq!(facets.count(2), Some(0));
        assert!(!facets.is_loading());
    }

    #[test]
    fn failure_is_local_to_one_value() {
        let mut facets = FacetCountAggregator::new(1..=5, 1);
        let queries = facets.sync(&base(""));

        let four = queries.iter().find(|q| q.ticket.value() == 4).unwrap();
        facets.resolve(
            four.ticket,
            Err(DiscoveryError::Status {
                status: 500,
                url: "http://listings.test".to_string(),
            }),
        );
        facets.resolve(queries[0].ticket, total(3));

        assert!(matches!(facets.status(4), Some(FacetStatus::Failed(_))));
        assert_eq!(facets.label(4), UNAVAILABLE);
        assert_eq!(facets.count(1), Some(3));
        assert_eq!(facets.status(2), Some(&FacetStatus::Loading));
    }

    #[test]
    fn only_failed_facets_are_retried() {
        let mut facets = FacetCountAggregator::new(1..=3, 1);
        let queries = facets.sync(&base("districts=Mirabad"));
        facets.resolve(queries[0].ticket, total(5));
        facets.resolve(
            queries[1].ticket,
            Err(DiscoveryError::Config("boom".to_string())),
        );

        let retries = facets.retry_failed();
        assert_eq!(retries.len(), 1);
        assert_eq!(retries[0].ticket.value(), 2);
        assert_eq!(facets.status(2), Some(&FacetStatus::Loading));
        assert_eq!(facets.count(1), Some(5));

        facets.resolve(retries[0].ticket, total(8));
        assert_eq!(facets.count(2), Some(8));
    }

    #[test]
    fn unchanged_base_issues_nothing() {
        let mut facets = FacetCountAggregator::new(1..=5, 1);
        assert_eq!(facets.sync(&base("cities=Tashkent")).len(), 5);
        assert!(facets.sync(&base("cities=Tashkent")).is_empty());
    }

    #[test]
    fn stale_counts_are_discarded_after_base_change() {
        let mut facets = FacetCountAggregator::new(1..=2, 1);
        let old = facets.sync(&base("priceTo=100000"));
        let new = facets.sync(&base("priceTo=200000"));

        assert_eq!(facets.resolve(old[0].ticket, total(99)), Resolution::Superseded);
        assert_eq!(facets.label(1), PLACEHOLDER);

        assert_eq!(facets.resolve(new[0].ticket, total(42)), Resolution::Applied);
        assert_eq!(facets.count(1), Some(42));
    }

    #[test]
    fn values_are_sorted_and_deduplicated() {
        let facets = FacetCountAggregator::new([3, 1, 3, 2], 1);
        assert_eq!(facets.values(), &[1, 2, 3]);
    }
}
