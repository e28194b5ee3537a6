use crate::error::{DiscoveryError, Result};
use crate::filters::{ROOM_MAX, ROOM_MIN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding [`ApiConfig::base_url`].
pub const API_URL_ENV: &str = "DISCOVERY_API_URL";

/// Connection settings for the listings endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Scheme and host of the listings API, e.g. `https://example.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the listings read endpoint
    #[serde(default = "default_listings_path")]
    pub listings_path: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Scroll proximity settings for the infinite-scroll sentinel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrollConfig {
    /// Distance from the end of the content (in pixels) that counts as "near the end"
    #[serde(default = "default_threshold_px")]
    pub threshold_px: f64,

    /// Minimum time between two "fetch next" signals
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

/// Configuration for a discovery session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub api: ApiConfig,

    /// Page size for the incremental list
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Page size for facet count queries (only `total` is read)
    #[serde(default = "default_facet_per_page")]
    pub facet_per_page: u32,

    /// Upper bound on listings fetched in map mode
    #[serde(default = "default_map_per_page")]
    pub map_per_page: u32,

    /// Room counts that get a facet count; the highest value is open-ended ("5+")
    #[serde(default = "default_room_facets")]
    pub room_facets: Vec<u8>,

    #[serde(default)]
    pub scroll: ScrollConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_listings_path() -> String {
    "/api/properties".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("property-discovery/{}", env!("CARGO_PKG_VERSION"))
}

fn default_threshold_px() -> f64 {
    400.0
}

fn default_min_interval_ms() -> u64 {
    250
}

fn default_per_page() -> u32 {
    20
}

fn default_facet_per_page() -> u32 {
    1
}

fn default_map_per_page() -> u32 {
    1000
}

fn default_room_facets() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listings_path: default_listings_path(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            threshold_px: default_threshold_px(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl ScrollConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            per_page: default_per_page(),
            facet_per_page: default_facet_per_page(),
            map_per_page: default_map_per_page(),
            room_facets: default_room_facets(),
            scroll: ScrollConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file, then apply the environment override.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DiscoveryError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env();
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults plus the environment override.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.map_per_page == 0 || self.facet_per_page == 0 {
            return Err(DiscoveryError::Config(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.room_facets.is_empty() {
            return Err(DiscoveryError::Config(
                "room_facets must list at least one value".to_string(),
            ));
        }
        if let Some(bad) = self
            .room_facets
            .iter()
            .find(|v| !(ROOM_MIN..=ROOM_MAX).contains(*v))
        {
            return Err(DiscoveryError::Config(format!(
                "room facet {} is outside {}..={}",
                bad, ROOM_MIN, ROOM_MAX
            )));
        }
        url::Url::parse(&self.api.base_url)?;
        Ok(())
    }
}
