use crate::api::types::ListingsRequest;
use crate::error::Result;
use crate::models::PageEnvelope;
use async_trait::async_trait;

/// Read access to a listings endpoint.
/// The discovery engine only ever asks for one page envelope at a time; list,
/// facet and map fetches differ only in the request they send.
#[async_trait]
pub trait ListingsApi: Send + Sync {
    /// Fetch one page envelope for the request
    async fn fetch_page(&self, request: &ListingsRequest) -> Result<PageEnvelope>;

    /// Get the name of the listings source
    fn source_name(&self) -> &'static str;
}
