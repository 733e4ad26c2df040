use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, error, instrument, trace};

use crate::error::{ApiError, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{ErrorEnvelope, WebSearchRequest, WebSearchResponse};

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/web_search";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the BigModel (Zhipu) web search endpoint
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl WebSearchClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "zsearch/",
                env!("CARGO_PKG_VERSION")
            )),
        );

        // Only fails if the TLS backend can't initialise; fall back to a plain client
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_config: RetryConfig::default(),
        }
    }

    /// Point at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a search and hand back the response body exactly as the service sent it
    #[instrument(skip(self, request), fields(query = %request.search_query, engine = %request.search_engine))]
    pub async fn search_raw(&self, request: &WebSearchRequest) -> Result<serde_json::Value> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::MissingApiKey);
        }
        request.validate()?;

        with_retry(&self.retry_config, ApiError::is_retryable, || {
            self.send_once(request)
        })
        .await
    }

    /// Run a search and decode the response into typed results
    pub async fn search(&self, request: &WebSearchRequest) -> Result<WebSearchResponse> {
        let raw = self.search_raw(request).await?;
        let response: WebSearchResponse = serde_json::from_value(raw)?;

        debug!(
            results = response.search_result.len(),
            intents = response.search_intent.len(),
            "Search completed"
        );
        Ok(response)
    }

    async fn send_once(&self, request: &WebSearchRequest) -> Result<serde_json::Value> {
        debug!(url = %self.base_url, "Sending web search request");
        trace!(body = ?request, "Search parameters");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::NetworkError(e)
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response.text().await?;
        trace!(body = %body, "Response body");

        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Response body is not valid JSON");
            ApiError::ParseError(e)
        })
    }
}

/// Map a non-2xx reply onto an error, preferring the service's own message
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
        StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
        _ => ApiError::RequestFailed {
            status: status.as_u16(),
            message,
        },
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.code, envelope.error.message) {
            (Some(code), Some(message)) => format!("{} (code {})", message, code),
            (None, Some(message)) => message,
            (Some(code), None) => format!("error code {}", code),
            (None, None) => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}
