// Request/response models for the BigModel web search endpoint
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, Result};

/// Longest query the endpoint handles well, in characters
pub const MAX_QUERY_CHARS: usize = 70;
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 50;
pub const DEFAULT_COUNT: u32 = 10;

/// Which search backend the service should run the query on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchEngine {
    #[serde(rename = "search_std")]
    Std,
    #[default]
    #[serde(rename = "search_pro")]
    Pro,
    #[serde(rename = "search_pro_sogou")]
    ProSogou,
    #[serde(rename = "search_pro_quark")]
    ProQuark,
    #[serde(rename = "search_pro_jina")]
    ProJina,
    #[serde(rename = "search_pro_bing")]
    ProBing,
}

impl SearchEngine {
    pub const ALL: [SearchEngine; 6] = [
        SearchEngine::Std,
        SearchEngine::Pro,
        SearchEngine::ProSogou,
        SearchEngine::ProQuark,
        SearchEngine::ProJina,
        SearchEngine::ProBing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::Std => "search_std",
            SearchEngine::Pro => "search_pro",
            SearchEngine::ProSogou => "search_pro_sogou",
            SearchEngine::ProQuark => "search_pro_quark",
            SearchEngine::ProJina => "search_pro_jina",
            SearchEngine::ProBing => "search_pro_bing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SearchEngine::Std => "Zhipu basic search",
            SearchEngine::Pro => "Zhipu advanced search",
            SearchEngine::ProSogou => "Sogou",
            SearchEngine::ProQuark => "Quark",
            SearchEngine::ProJina => "jina.ai",
            SearchEngine::ProBing => "Bing",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        SearchEngine::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown search engine: {}", s)))
    }
}

/// Restricts results to pages published within a time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecencyFilter {
    #[serde(rename = "oneDay")]
    OneDay,
    #[serde(rename = "oneWeek")]
    OneWeek,
    #[serde(rename = "oneMonth")]
    OneMonth,
    #[serde(rename = "oneYear")]
    OneYear,
    #[default]
    #[serde(rename = "noLimit")]
    NoLimit,
}

impl RecencyFilter {
    pub const ALL: [RecencyFilter; 5] = [
        RecencyFilter::OneDay,
        RecencyFilter::OneWeek,
        RecencyFilter::OneMonth,
        RecencyFilter::OneYear,
        RecencyFilter::NoLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecencyFilter::OneDay => "oneDay",
            RecencyFilter::OneWeek => "oneWeek",
            RecencyFilter::OneMonth => "oneMonth",
            RecencyFilter::OneYear => "oneYear",
            RecencyFilter::NoLimit => "noLimit",
        }
    }
}

impl fmt::Display for RecencyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecencyFilter {
    type Err = ApiError;

    // Accepts the wire names as well as kebab/snake spellings ("one-day", "no_limit")
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        RecencyFilter::ALL
            .into_iter()
            .find(|r| r.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown recency filter: {}", s)))
    }
}

/// How much page text the service returns per result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSize {
    /// Roughly 400-600 characters per result
    #[default]
    Medium,
    /// Up to about 2500 characters per result
    High,
}

impl ContentSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSize::Medium => "medium",
            ContentSize::High => "high",
        }
    }
}

impl fmt::Display for ContentSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentSize {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "medium" => Ok(ContentSize::Medium),
            "high" => Ok(ContentSize::High),
            other => Err(ApiError::InvalidRequest(format!(
                "unknown content size: {}",
                other
            ))),
        }
    }
}

/// Body of a web search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchRequest {
    pub search_query: String,
    pub search_engine: SearchEngine,
    pub search_intent: bool,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_domain_filter: Option<String>,
    pub search_recency_filter: RecencyFilter,
    pub content_size: ContentSize,
}

impl WebSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            search_query: query.into(),
            search_engine: SearchEngine::default(),
            search_intent: false,
            count: DEFAULT_COUNT,
            search_domain_filter: None,
            search_recency_filter: RecencyFilter::default(),
            content_size: ContentSize::default(),
        }
    }

    pub fn engine(mut self, engine: SearchEngine) -> Self {
        self.search_engine = engine;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn recency(mut self, recency: RecencyFilter) -> Self {
        self.search_recency_filter = recency;
        self
    }

    /// Blank domains are treated as no filter
    pub fn domain(mut self, domain: Option<String>) -> Self {
        self.search_domain_filter = domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn content_size(mut self, size: ContentSize) -> Self {
        self.content_size = size;
        self
    }

    /// Ask the service to run its own intent recognition first
    pub fn intent(mut self, enabled: bool) -> Self {
        self.search_intent = enabled;
        self
    }

    /// Check the parameters the service would reject anyway
    pub fn validate(&self) -> Result<()> {
        let query = self.search_query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidRequest("search query is empty".into()));
        }

        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(ApiError::InvalidRequest(format!(
                "search query is {} characters, limit is {}",
                chars, MAX_QUERY_CHARS
            )));
        }

        if !(MIN_COUNT..=MAX_COUNT).contains(&self.count) {
            return Err(ApiError::InvalidRequest(format!(
                "count must be between {} and {}, got {}",
                MIN_COUNT, MAX_COUNT, self.count
            )));
        }

        // Sogou only pages in tens
        if self.search_engine == SearchEngine::ProSogou && self.count % 10 != 0 {
            return Err(ApiError::InvalidRequest(format!(
                "{} only accepts counts of 10, 20, 30, 40 or 50, got {}",
                SearchEngine::ProSogou,
                self.count
            )));
        }

        Ok(())
    }
}

/// How the service interpreted the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIntent {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub keywords: String,
}

/// A single hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub link: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub refer: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub search_intent: Vec<SearchIntent>,
    #[serde(default)]
    pub search_result: Vec<SearchResultItem>,
}

impl WebSearchResponse {
    /// `created` is unix seconds; zero or out of range means unknown
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if self.created <= 0 {
            return None;
        }
        Utc.timestamp_opt(self.created, 0).single()
    }
}

/// Shape of the body the service sends with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
