//! Web search through the Google Custom Search JSON API.

use super::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, FailureKind,
    ProviderFailure,
};
use crate::config::SearchConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const NAME: &str = "web_search";

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

pub struct WebSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    cx: Option<String>,
    max_results: usize,
}

impl WebSearchProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        cx: Option<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            cx,
            max_results: max_results.max(1),
        })
    }

    /// Credentials come from the environment variables the config names.
    pub fn from_config(config: &SearchConfig) -> Result<Self, ApiError> {
        Self::new(
            config.endpoint.clone(),
            std::env::var(&config.api_key_env).ok().filter(|v| !v.is_empty()),
            std::env::var(&config.cx_env).ok().filter(|v| !v.is_empty()),
            config.max_results,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderFailure> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.cx.as_deref()) else {
            return Err(ProviderFailure::new(
                NAME,
                FailureKind::MissingCredential,
                "search API key or engine id not configured",
            ));
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("key", key), ("cx", cx)])
            .send()
            .await
            .map_err(|e| ProviderFailure::from_reqwest(NAME, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::from_status(NAME, status, &body));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            ProviderFailure::new(NAME, FailureKind::Unavailable, format!("bad response: {}", e))
        })?;

        let hits: Vec<SearchHit> = parsed
            .items
            .into_iter()
            .take(self.max_results)
            .map(|item| SearchHit {
                title: item.title.unwrap_or_else(|| "No Title".to_string()),
                link: item.link.unwrap_or_default(),
                snippet: item.snippet.unwrap_or_default(),
            })
            .collect();
        debug!(query, hits = hits.len(), "Web search completed");
        Ok(hits)
    }
}

#[async_trait]
impl CapabilityProvider for WebSearchProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::WebSearch
    }

    fn description(&self) -> &str {
        "Searches the web and returns the top ranked results (title, link, snippet)."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::WebSearch { query } => Ok(CapabilityOutput::SearchResults {
                hits: self.search(&query).await?,
            }),
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
