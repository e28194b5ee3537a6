use super::pager::ResultPager;
use std::time::{Duration, Instant};
use tracing::trace;

/// Scroll position of the rendered list, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport: f64,
    pub content: f64,
}

impl ScrollMetrics {
    pub fn new(offset: f64, viewport: f64, content: f64) -> Self {
        Self {
            offset,
            viewport,
            content,
        }
    }

    pub fn distance_to_end(&self) -> f64 {
        (self.content - (self.offset + self.viewport)).max(0.0)
    }
}

/// Turns scroll events into "fetch next" signals.
///
/// A signal is emitted when the viewport gets within `threshold` pixels of the
/// end of the content and the pager can take another page. After emitting, the
/// sentinel stays quiet until the pager has settled that fetch (or started a
/// new sequence) and `min_interval` has passed, so a burst of scroll events
/// produces one request.
#[derive(Debug, Clone)]
pub struct ScrollSentinel {
    threshold: f64,
    min_interval: Duration,
    /// Pager (generation, settled fetches) at the time of the last signal.
    pending: Option<(u64, u64)>,
    last_emit: Option<Instant>,
}

impl ScrollSentinel {
    pub fn new(threshold: f64, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            pending: None,
            last_emit: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget any outstanding signal, e.g. after the filters changed.
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_emit = None;
    }

    pub fn observe(&mut self, metrics: ScrollMetrics, pager: &ResultPager, now: Instant) -> bool {
        if let Some((generation, settled)) = self.pending {
            let moved_on =
                pager.generation() != generation || pager.settled_fetches() > settled;
            if !moved_on {
                trace!("Scroll signal suppressed: previous fetch still outstanding");
                return false;
            }
            self.pending = None;
        }

        if metrics.distance_to_end() > self.threshold || !pager.can_request_next() {
            return false;
        }

        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.min_interval {
                trace!("Scroll signal suppressed: minimum interval not elapsed");
                return false;
            }
        }

        self.pending = Some((pager.generation(), pager.settled_fetches()));
        self.last_emit = Some(now);
        true
    }
}
