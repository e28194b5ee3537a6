//! Property discovery engine for a listings marketplace.
//!
//! Turns URL query filters into a paginated, counted and ordered stream of
//! listings fetched from a listings API, keeping the filters round-trippable
//! through a shareable query string.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filters;
pub mod models;

pub use api::{HttpListingsApi, ListingsApi, ListingsRequest};
pub use config::DiscoveryConfig;
pub use discovery::DiscoverySession;
pub use error::{DiscoveryError, Result};
pub use filters::{FilterCodec, FilterCriteria, QueryIdentity};
