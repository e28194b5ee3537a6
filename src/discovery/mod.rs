//! The discovery engine: filter state, paging, facet counts, sort replay, view
//! modes and scroll-driven loading.
//!
//! Each component is a plain state machine that hands out tagged requests and
//! accepts their responses back. [`DiscoverySession`] owns all of them, keeps
//! the fetches in flight and routes each response back as it arrives.

pub mod facets;
pub mod pager;
pub mod sentinel;
pub mod session;
pub mod sort;
pub mod store;
pub mod view_mode;

pub use facets::{FacetCountAggregator, FacetQuery, FacetStatus, FacetTicket};
pub use pager::{PageTicket, PagerState, ResultPager};
pub use sentinel::{ScrollMetrics, ScrollSentinel};
pub use session::{Delivery, DiscoverySession};
pub use sort::SortReconciler;
pub use store::FilterStore;
pub use view_mode::{MapQuery, MapStatus, MapTicket, ViewAction, ViewMode, ViewModeController};

/// Outcome of handing a response back to the component that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The request's state is no longer current; the response was dropped.
    Superseded,
}
