//! Repository fetch: GitHub username -> bounded list of repository summaries.

use super::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, FailureKind,
    ProviderFailure,
};
use crate::config::GithubConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const NAME: &str = "repositories";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    /// Primary language as detected by the host.
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoRecord {
    name: String,
    description: Option<String>,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    fork: bool,
}

pub struct RepositoryProvider {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    max_repos: usize,
}

impl RepositoryProvider {
    pub fn new(
        api_base: impl Into<String>,
        token: Option<String>,
        max_repos: usize,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cvforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            max_repos: max_repos.max(1),
        })
    }

    pub fn from_config(config: &GithubConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_base.clone(),
            std::env::var(&config.token_env).ok().filter(|v| !v.is_empty()),
            config.max_repos,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Accepts a bare username or a profile url.
    pub fn normalize_username(input: &str) -> Option<String> {
        let trimmed = input.trim().trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed).trim_start_matches('@');
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| name.to_string())
    }

    async fn fetch(&self, username: &str) -> Result<Vec<RepositorySummary>, ProviderFailure> {
        let user = Self::normalize_username(username).ok_or_else(|| {
            ProviderFailure::new(
                NAME,
                FailureKind::InvalidRequest,
                format!("invalid username: {}", username),
            )
        })?;

        let url = format!("{}/users/{}/repos", self.api_base, user);
        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", self.max_repos.to_string()), ("sort", "updated".to_string())])
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderFailure::from_reqwest(NAME, &e))?;
        let status = response.status();
        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(false);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 403 && exhausted {
                warn!(user = %user, "Repository host rate limit exhausted");
                return Err(ProviderFailure::new(
                    NAME,
                    FailureKind::RateLimited,
                    "API rate limit exhausted",
                ));
            }
            return Err(ProviderFailure::from_status(NAME, status, &body));
        }

        let records: Vec<RepoRecord> = response.json().await.map_err(|e| {
            ProviderFailure::new(NAME, FailureKind::Unavailable, format!("bad response: {}", e))
        })?;
        let repos: Vec<RepositorySummary> = records
            .into_iter()
            .filter(|r| !r.fork)
            .take(self.max_repos)
            .map(|r| RepositorySummary {
                name: r.name,
                description: r.description.filter(|d| !d.trim().is_empty()),
                url: r.html_url,
                language: r.language,
            })
            .collect();
        debug!(user = %user, count = repos.len(), "Fetched repositories");
        Ok(repos)
    }
}

#[async_trait]
impl CapabilityProvider for RepositoryProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Repositories
    }

    fn description(&self) -> &str {
        "Lists a user's public, non-fork repositories with description, url and primary language."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::Repositories { username } => {
                let repositories = self.fetch(&username).await?;
                Ok(CapabilityOutput::Repositories {
                    username,
                    repositories,
                })
            }
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
