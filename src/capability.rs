//! Capability Providers
//!
//! Uniform wrappers around external operations (search, fetch, extraction) that
//! agents may invoke while executing a task. A provider never panics or throws
//! past the agent boundary: every failure comes back as a [`ProviderFailure`]
//! value and the owning task's policy decides what happens next.

pub mod document;
pub mod image;
pub mod keywords;
pub mod page_fetch;
pub mod repositories;
mod set;
pub mod web_search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use document::{DocumentText, DocumentTextProvider};
pub use image::{ImageNormalizeProvider, NormalizedImage};
pub use keywords::{JobKeywordProvider, KeywordReport};
pub use page_fetch::PageFetchProvider;
pub use repositories::{RepositoryProvider, RepositorySummary};
pub use set::{CapabilityRegistry, CapabilitySet};
pub use web_search::{SearchHit, WebSearchProvider};

/// Closed set of capability kinds the pipeline knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    WebSearch,
    PageFetch,
    Repositories,
    DocumentText,
    ImageNormalize,
    JobKeywords,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 6] = [
        CapabilityKind::WebSearch,
        CapabilityKind::PageFetch,
        CapabilityKind::Repositories,
        CapabilityKind::DocumentText,
        CapabilityKind::ImageNormalize,
        CapabilityKind::JobKeywords,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::WebSearch => "web_search",
            CapabilityKind::PageFetch => "page_fetch",
            CapabilityKind::Repositories => "repositories",
            CapabilityKind::DocumentText => "document_text",
            CapabilityKind::ImageNormalize => "image_normalize",
            CapabilityKind::JobKeywords => "job_keywords",
        }
    }

    /// Build a typed request for this kind from rendered call arguments.
    ///
    /// An empty primary argument is an invalid request; optional enrichment
    /// steps rely on this to degrade into a recorded warning.
    pub fn build_request(
        &self,
        argument: &str,
        secondary: Option<&str>,
        dimensions: Option<(u32, u32)>,
    ) -> Result<CapabilityRequest, ProviderFailure> {
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(ProviderFailure::new(
                self.as_str(),
                FailureKind::InvalidRequest,
                "empty argument",
            ));
        }
        let request = match self {
            CapabilityKind::WebSearch => CapabilityRequest::WebSearch {
                query: argument.to_string(),
            },
            CapabilityKind::PageFetch => CapabilityRequest::PageFetch {
                url: argument.to_string(),
            },
            CapabilityKind::Repositories => CapabilityRequest::Repositories {
                username: argument.to_string(),
            },
            CapabilityKind::DocumentText => CapabilityRequest::DocumentText {
                path: PathBuf::from(argument),
            },
            CapabilityKind::ImageNormalize => {
                let (width, height) = dimensions.unwrap_or((200, 200));
                CapabilityRequest::ImageNormalize {
                    path: PathBuf::from(argument),
                    width,
                    height,
                }
            }
            CapabilityKind::JobKeywords => CapabilityRequest::JobKeywords {
                job_description: argument.to_string(),
                resume_text: secondary
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            },
        };
        Ok(request)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed request handed to a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityRequest {
    WebSearch { query: String },
    PageFetch { url: String },
    Repositories { username: String },
    DocumentText { path: PathBuf },
    ImageNormalize { path: PathBuf, width: u32, height: u32 },
    JobKeywords { job_description: String, resume_text: Option<String> },
}

impl CapabilityRequest {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityRequest::WebSearch { .. } => CapabilityKind::WebSearch,
            CapabilityRequest::PageFetch { .. } => CapabilityKind::PageFetch,
            CapabilityRequest::Repositories { .. } => CapabilityKind::Repositories,
            CapabilityRequest::DocumentText { .. } => CapabilityKind::DocumentText,
            CapabilityRequest::ImageNormalize { .. } => CapabilityKind::ImageNormalize,
            CapabilityRequest::JobKeywords { .. } => CapabilityKind::JobKeywords,
        }
    }
}

/// Typed result returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapabilityOutput {
    SearchResults { hits: Vec<SearchHit> },
    PageText { url: String, text: String },
    Repositories { username: String, repositories: Vec<RepositorySummary> },
    Document(DocumentText),
    Image(NormalizedImage),
    Keywords(KeywordReport),
}

impl CapabilityOutput {
    /// Text form injected into the agent's context.
    pub fn render(&self) -> String {
        match self {
            CapabilityOutput::SearchResults { hits } => {
                if hits.is_empty() {
                    return "No search results.".to_string();
                }
                hits.iter()
                    .enumerate()
                    .map(|(i, hit)| {
                        format!("{}. {} <{}>\n   {}", i + 1, hit.title, hit.link, hit.snippet)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            CapabilityOutput::PageText { url, text } => format!("Source: {}\n\n{}", url, text),
            CapabilityOutput::Repositories {
                username,
                repositories,
            } => {
                let mut out = format!("Repositories for {}:", username);
                for repo in repositories {
                    out.push_str(&format!(
                        "\n- {} ({}): {} <{}>",
                        repo.name,
                        repo.language.as_deref().unwrap_or("unknown"),
                        repo.description.as_deref().unwrap_or("No description"),
                        repo.url
                    ));
                }
                out
            }
            CapabilityOutput::Document(doc) => doc.text.clone(),
            CapabilityOutput::Image(image) => format!(
                "Normalized image: {} ({}x{})",
                image.path.display(),
                image.width,
                image.height
            ),
            CapabilityOutput::Keywords(report) => report.render(),
        }
    }
}

/// Why a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Auth,
    MissingCredential,
    RateLimited,
    NotFound,
    InvalidRequest,
    Unavailable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Network => "network",
            FailureKind::Auth => "auth",
            FailureKind::MissingCredential => "missing credential",
            FailureKind::RateLimited => "rate limited",
            FailureKind::NotFound => "not found",
            FailureKind::InvalidRequest => "invalid request",
            FailureKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Failure value returned by a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{capability} failed ({kind}): {message}")]
pub struct ProviderFailure {
    pub capability: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(capability: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            capability: capability.to_string(),
            kind,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status onto a failure kind.
    pub fn from_status(capability: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => FailureKind::Auth,
            404 => FailureKind::NotFound,
            429 => FailureKind::RateLimited,
            s if s >= 500 => FailureKind::Unavailable,
            _ => FailureKind::InvalidRequest,
        };
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate_chars(body, 200))
        };
        Self::new(capability, kind, message)
    }

    pub fn from_reqwest(capability: &str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(capability, status, "");
        }
        Self::new(capability, FailureKind::Network, err.to_string())
    }

    /// Request kind did not match the provider it was sent to.
    pub fn wrong_request(capability: &str, request: &CapabilityRequest) -> Self {
        Self::new(
            capability,
            FailureKind::InvalidRequest,
            format!("unsupported request kind {}", request.kind()),
        )
    }
}

/// Description of a capability passed to the generative backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub kind: CapabilityKind,
    pub description: String,
}

/// External operation an agent may invoke.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Name agents bind to.
    fn name(&self) -> &str;

    fn kind(&self) -> CapabilityKind;

    fn description(&self) -> &str;

    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name().to_string(),
            kind: self.kind(),
            description: self.description().to_string(),
        }
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure>;
}

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
