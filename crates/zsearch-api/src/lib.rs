// Client for the BigModel web search API
pub mod client;
pub mod error;
pub mod retry;
pub mod types;

// Re-export common types
pub use client::{WebSearchClient, DEFAULT_BASE_URL};
pub use error::{ApiError, Result};
pub use retry::RetryConfig;
pub use types::{
    ContentSize, RecencyFilter, SearchEngine, SearchIntent, SearchResultItem, WebSearchRequest,
    WebSearchResponse,
};
