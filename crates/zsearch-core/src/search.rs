use crate::Result;
use async_trait::async_trait;
use tracing::debug;
use zsearch_api::{WebSearchClient, WebSearchRequest};

/// Anything that can answer a web search request
///
/// The tool server talks to this trait rather than the HTTP client so it can
/// be exercised without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run the search and return the raw response body
    async fn search(&self, request: &WebSearchRequest) -> Result<serde_json::Value>;
}

#[async_trait]
impl SearchBackend for WebSearchClient {
    async fn search(&self, request: &WebSearchRequest) -> Result<serde_json::Value> {
        debug!(
            "Searching '{}' via {} (count={}, recency={})",
            request.search_query, request.search_engine, request.count, request.search_recency_filter
        );
        Ok(self.search_raw(request).await?)
    }
}
