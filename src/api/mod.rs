pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpListingsApi;
pub use traits::ListingsApi;
pub use types::{ListingsRequest, RequestPurpose};
