//! Web page fetch: url -> readable text.

use super::{
    truncate_chars, CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest,
    FailureKind, ProviderFailure,
};
use crate::config::FetchConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "page_fetch";

pub struct PageFetchProvider {
    client: reqwest::Client,
    max_chars: usize,
}

impl PageFetchProvider {
    pub fn new(timeout: Duration, max_chars: usize) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cvforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, max_chars })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, ApiError> {
        Self::new(Duration::from_secs(config.timeout_secs), config.max_chars)
    }

    async fn fetch(&self, url: &str) -> Result<String, ProviderFailure> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ProviderFailure::new(
                NAME,
                FailureKind::InvalidRequest,
                format!("not an http(s) url: {}", url),
            ));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderFailure::from_reqwest(NAME, &e))?;
        let status = response.status();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);
        let body = response
            .text()
            .await
            .map_err(|e| ProviderFailure::from_reqwest(NAME, &e))?;
        if !status.is_success() {
            return Err(ProviderFailure::from_status(NAME, status, &body));
        }

        let text = if is_html { html_to_text(&body)? } else { body };
        let text = truncate_chars(text.trim(), self.max_chars).to_string();
        debug!(url, chars = text.chars().count(), "Fetched page");
        Ok(text)
    }
}

/// Convert HTML to markdown, dropping script and style content.
pub fn html_to_text(html: &str) -> Result<String, ProviderFailure> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .build();
    converter.convert(html).map_err(|e| {
        ProviderFailure::new(NAME, FailureKind::Unavailable, format!("unreadable page: {}", e))
    })
}

#[async_trait]
impl CapabilityProvider for PageFetchProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::PageFetch
    }

    fn description(&self) -> &str {
        "Fetches a web page and returns its readable text."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::PageFetch { url } => {
                let text = self.fetch(&url).await?;
                Ok(CapabilityOutput::PageText { url, text })
            }
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
