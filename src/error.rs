use thiserror::Error;

/// Errors raised while talking to the listings endpoint or loading configuration.
///
/// None of these are fatal to a discovery session: each one is contained by the
/// component that owns the failed request (pager, facet, map fetch).
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Listings endpoint returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode listings response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
