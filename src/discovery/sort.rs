use crate::filters::SortOrder;
use tracing::debug;

/// Watches the sort sub-state and reports when it needs to be replayed.
///
/// Detection is by value: `observe` fires once per actual change, never for a
/// repeated identical value. The first observation only records a baseline.
#[derive(Debug, Clone, Default)]
pub struct SortReconciler {
    last_seen: Option<SortOrder>,
}

impl SortReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self) -> Option<SortOrder> {
        self.last_seen
    }

    /// Returns true when `current` differs from the last seen sort. The caller
    /// is expected to reapply the current filters exactly once in that case.
    pub fn observe(&mut self, current: SortOrder) -> bool {
        match self.last_seen {
            None => {
                self.last_seen = Some(current);
                false
            }
            Some(previous) if previous == current => false,
            Some(previous) => {
                debug!("Sort changed from {} to {}", previous, current);
                self.last_seen = Some(current);
                true
            }
        }
    }

    /// Record a sort that was already applied through the normal filter path,
    /// so it is not replayed a second time.
    pub fn acknowledge(&mut self, applied: SortOrder) {
        self.last_seen = Some(applied);
    }
}
