//! Typed filter state for property discovery.
//!
//! [`FilterCriteria`] is the canonical form of everything a user can constrain.
//! It splits into [`SearchFilters`] (what is searched) and [`SortOrder`] (how the
//! results are ordered) so that a sort change can be told apart from a new
//! search. Every field is optional: an empty set, `None` or an unbounded range
//! means "unconstrained".

pub mod codec;

pub use codec::{FilterCodec, QueryParam};

use crate::models::OfferType;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Joins the values of a multi-value parameter on the wire.
pub const LIST_SEPARATOR: char = ',';

/// Smallest room count a listing can be filtered by.
pub const ROOM_MIN: u8 = 1;
/// Largest room bucket. It is open-ended: `5` means "5 or more rooms".
pub const ROOM_MAX: u8 = 5;

/// Two independent bounds; either, both or neither may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RangeFilter<T> {
    pub from: Option<T>,
    pub to: Option<T>,
}

impl<T> RangeFilter<T> {
    pub fn between(from: T, to: T) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn at_least(from: T) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn at_most(to: T) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }
}

/// Selected room buckets, always canonical.
///
/// Construction filters out values outside `ROOM_MIN..=ROOM_MAX` and refuses to
/// build a selection that is empty or covers every bucket, since both mean
/// "no room constraint".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomSelection(BTreeSet<u8>);

impl RoomSelection {
    pub fn new(values: impl IntoIterator<Item = u8>) -> Option<Self> {
        let set: BTreeSet<u8> = values
            .into_iter()
            .filter(|v| (ROOM_MIN..=ROOM_MAX).contains(v))
            .collect();
        let all = usize::from(ROOM_MAX - ROOM_MIN + 1);
        if set.is_empty() || set.len() == all {
            None
        } else {
            Some(Self(set))
        }
    }

    /// Contiguous selection from `from` (default [`ROOM_MIN`]) to `to`
    /// (default [`ROOM_MAX`], which is open-ended).
    pub fn range(from: Option<u8>, to: Option<u8>) -> Option<Self> {
        let from = from.unwrap_or(ROOM_MIN);
        let to = to.unwrap_or(ROOM_MAX);
        if from > to {
            return None;
        }
        Self::new(from..=to)
    }

    /// A single bucket, as used by facet queries.
    pub fn only(value: u8) -> Option<Self> {
        Self::new([value])
    }

    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, value: u8) -> bool {
        self.0.contains(&value)
    }

    pub fn min(&self) -> u8 {
        self.0.iter().next().copied().unwrap_or(ROOM_MIN)
    }

    pub fn max(&self) -> u8 {
        self.0.iter().next_back().copied().unwrap_or(ROOM_MAX)
    }

    pub fn is_contiguous(&self) -> bool {
        usize::from(self.max() - self.min()) + 1 == self.0.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Price,
    TotalArea,
    Date,
    ListingType,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Price,
        SortKey::TotalArea,
        SortKey::Date,
        SortKey::ListingType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::TotalArea => "total_area",
            SortKey::Date => "date",
            SortKey::ListingType => "listing_type",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Sort sub-state. Without a key the server's default ordering applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortOrder {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "{}:{}", key.as_str(), self.direction.as_str()),
            None => write!(f, "default:{}", self.direction.as_str()),
        }
    }
}

/// Every constraint except ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchFilters {
    pub price: RangeFilter<u64>,
    pub area: RangeFilter<u32>,
    pub floor: RangeFilter<i32>,
    pub rooms: Option<RoomSelection>,
    pub property_types: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub districts: BTreeSet<String>,
    pub repairs: BTreeSet<String>,
    pub landmark: Option<String>,
    pub offer_type: Option<OfferType>,
    pub listing_type: Option<String>,
}

impl SearchFilters {
    /// Same filters with the room dimension cleared and replaced by `rooms`.
    pub fn with_rooms(&self, rooms: Option<RoomSelection>) -> Self {
        Self {
            rooms,
            ..self.clone()
        }
    }

    /// Trim free text and set members, dropping the ones that end up empty.
    /// Set members containing a comma are dropped too: the wire format joins
    /// them with commas and could not split them back apart.
    pub fn canonical(self) -> Self {
        Self {
            property_types: canonical_set(self.property_types),
            cities: canonical_set(self.cities),
            districts: canonical_set(self.districts),
            repairs: canonical_set(self.repairs),
            landmark: canonical_text(self.landmark),
            listing_type: canonical_text(self.listing_type),
            ..self
        }
    }
}

fn canonical_set(set: BTreeSet<String>) -> BTreeSet<String> {
    set.into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| {
            if v.contains(LIST_SEPARATOR) {
                warn!(value = %v, "Dropping list filter value containing a comma");
                return false;
            }
            !v.is_empty()
        })
        .collect()
}

fn canonical_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// The full, canonical filter state mirrored into the shareable URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    pub search: SearchFilters,
    pub sort: SortOrder,
}

impl FilterCriteria {
    pub fn new(search: SearchFilters, sort: SortOrder) -> Self {
        Self { search, sort }
    }

    pub fn canonical(self) -> Self {
        Self {
            search: self.search.canonical(),
            sort: self.sort,
        }
    }

    /// Copy with a different sort; the search part is untouched.
    pub fn with_sort(&self, sort: SortOrder) -> Self {
        Self {
            search: self.search.clone(),
            sort,
        }
    }

    /// True when both describe the same search, regardless of ordering.
    pub fn same_search(&self, other: &FilterCriteria) -> bool {
        self.search == other.search
    }

    pub fn identity(&self) -> QueryIdentity {
        QueryIdentity(FilterCodec::to_query_string(self))
    }
}

/// Canonical serialization of filters and sort, excluding the page cursor.
///
/// Accumulated pages stay valid only while the identity they were fetched
/// under is still current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryIdentity(String);

impl QueryIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<unfiltered>")
        } else {
            f.write_str(&self.0)
        }
    }
}
