use crate::filters::{FilterCodec, FilterCriteria, SearchFilters, SortOrder};
use std::fmt;

/// What a request is fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    /// One page of the incremental list
    List,
    /// Count-only query for a facet value
    Facet,
    /// One-shot bounded fetch for the map
    Map,
}

impl fmt::Display for RequestPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestPurpose::List => "list",
            RequestPurpose::Facet => "facet",
            RequestPurpose::Map => "map",
        })
    }
}

/// Parameters for one call to the listings endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ListingsRequest {
    /// Filters and sort sent as query parameters
    pub criteria: FilterCriteria,
    /// 1-based page index
    pub page: u32,
    /// Page size
    pub per_page: u32,
    pub purpose: RequestPurpose,
}

impl ListingsRequest {
    pub fn list(criteria: FilterCriteria, page: u32, per_page: u32) -> Self {
        Self {
            criteria,
            page,
            per_page,
            purpose: RequestPurpose::List,
        }
    }

    /// Facet counts don't depend on ordering, so the sort is left at its default.
    pub fn facet(search: SearchFilters, per_page: u32) -> Self {
        Self {
            criteria: FilterCriteria::new(search, SortOrder::default()),
            page: 1,
            per_page,
            purpose: RequestPurpose::Facet,
        }
    }

    pub fn map(criteria: FilterCriteria, per_page: u32) -> Self {
        Self {
            criteria,
            page: 1,
            per_page,
            purpose: RequestPurpose::Map,
        }
    }

    /// Filter parameters followed by `page` and `per_page`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = FilterCodec::encode_pairs(&self.criteria);
        pairs.push(("page", self.page.to_string()));
        pairs.push(("per_page", self.per_page.to_string()));
        pairs
    }
}
