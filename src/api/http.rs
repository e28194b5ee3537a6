use crate::api::traits::ListingsApi;
use crate::api::types::ListingsRequest;
use crate::config::ApiConfig;
use crate::error::{DiscoveryError, Result};
use crate::models::PageEnvelope;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Listings endpoint reached over HTTP
pub struct HttpListingsApi {
    client: Client,
    endpoint: Url,
}

impl HttpListingsApi {
    /// Create a client for the endpoint described by the config
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url)?.join(&config.listings_path)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ListingsApi for HttpListingsApi {
    async fn fetch_page(&self, request: &ListingsRequest) -> Result<PageEnvelope> {
        debug!(
            purpose = %request.purpose,
            page = request.page,
            per_page = request.per_page,
            "Fetching {}",
            self.endpoint
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&request.query_pairs())
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Listings endpoint returned status: {}", response.status());
            return Err(DiscoveryError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Downloaded {} bytes of JSON", body.len());

        let envelope: PageEnvelope = serde_json::from_str(&body)?;
        Ok(envelope)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
