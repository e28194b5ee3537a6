use crate::filters::{FilterCodec, FilterCriteria};
use std::sync::Arc;
use tracing::debug;

/// Single owner of the canonical filter snapshot.
///
/// Readers hold an `Arc` to a complete snapshot; updates swap in a complete
/// replacement value and never patch the current one in place, so no reader can
/// observe a half-applied filter change.
#[derive(Debug, Clone, Default)]
pub struct FilterStore {
    current: Arc<FilterCriteria>,
    /// Bumped on every replacement that actually changed the value.
    version: u64,
}

impl FilterStore {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            current: Arc::new(criteria.canonical()),
            version: 0,
        }
    }

    /// Decode the initial state from a URL query string.
    pub fn from_query(query: &str) -> Self {
        Self::new(FilterCodec::decode(query))
    }

    pub fn snapshot(&self) -> Arc<FilterCriteria> {
        Arc::clone(&self.current)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Canonical shareable query string for the current snapshot.
    pub fn query_string(&self) -> String {
        FilterCodec::to_query_string(&self.current)
    }

    /// Swap in a new snapshot. Returns false (and keeps the version) when the
    /// replacement is equal to the current value.
    pub fn replace(&mut self, criteria: FilterCriteria) -> bool {
        let criteria = criteria.canonical();
        if *self.current == criteria {
            return false;
        }
        self.current = Arc::new(criteria);
        self.version += 1;
        debug!(version = self.version, "Filters replaced: {}", self.query_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{RangeFilter, SortDirection, SortKey, SortOrder};
    use pretty_assertions::assert_eq;

    #[test]
    fn replace_bumps_version_only_on_change() {
        let mut store = FilterStore::from_query("priceFrom=100");
        assert_eq!(store.version(), 0);

        let same = (*store.snapshot()).clone();
        assert!(!store.replace(same));
        assert_eq!(store.version(), 0);

        let mut next = (*store.snapshot()).clone();
        next.search.price = RangeFilter::at_least(150);
        assert!(store.replace(next));
        assert_eq!(store.version(), 1);
        assert_eq!(store.query_string(), "priceFrom=150");
    }

    #[test]
    fn old_snapshots_stay_intact_after_replace() {
        let mut store = FilterStore::from_query("cities=Bukhara");
        let before = store.snapshot();

        store.replace(before.with_sort(SortOrder::by(SortKey::Date, SortDirection::Asc)));

        assert_eq!(before.sort, SortOrder::default());
        assert_eq!(store.snapshot().sort.key, Some(SortKey::Date));
        assert_eq!(store.query_string(), "cities=Bukhara&sort=date&dir=asc");
    }
}
