//! Reference documentation for the with-documentation approach.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default cap on documentation length, in characters.
pub const DEFAULT_DOC_MAX_CHARS: usize = 50_000;

/// Appended to documentation that was cut at the cap.
pub const TRUNCATION_MARKER: &str = "\n\n[... documentation truncated ...]";

/// Record of a truncation, for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationInfo {
    pub truncated: bool,
    pub original_length: usize,
    /// Characters kept, excluding the marker.
    pub truncated_length: usize,
    pub chars_removed: usize,
}

/// Documentation text ready to be placed in a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedDoc {
    pub url: String,
    pub text: String,
    pub truncation: TruncationInfo,
    /// Set when the fetch failed and `text` is a placeholder.
    pub fetch_error: Option<String>,
}

impl FetchedDoc {
    /// Build from a fetched body, truncating to `max_chars`.
    pub fn from_body(url: &str, body: &str, max_chars: usize) -> Self {
        let (text, truncation) = truncate_documentation(body, max_chars);
        Self {
            url: url.to_string(),
            text,
            truncation,
            fetch_error: None,
        }
    }

    /// Placeholder used in place of documentation that could not be fetched.
    pub fn unavailable(url: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let text = format!("[Documentation unavailable: {}]", reason);
        let length = text.chars().count();
        Self {
            url: url.to_string(),
            text,
            truncation: TruncationInfo {
                truncated: false,
                original_length: length,
                truncated_length: length,
                chars_removed: 0,
            },
            fetch_error: Some(reason),
        }
    }
}

/// Cut `text` to at most `max_chars` characters and append the marker when
/// anything was removed.
pub fn truncate_documentation(text: &str, max_chars: usize) -> (String, TruncationInfo) {
    let original_length = text.chars().count();
    if original_length <= max_chars {
        return (
            text.to_string(),
            TruncationInfo {
                truncated: false,
                original_length,
                truncated_length: original_length,
                chars_removed: 0,
            },
        );
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
    truncated.push_str(&text[..cut]);
    truncated.push_str(TRUNCATION_MARKER);

    (
        truncated,
        TruncationInfo {
            truncated: true,
            original_length,
            truncated_length: max_chars,
            chars_removed: original_length - max_chars,
        },
    )
}

/// Source of reference documentation. Never fails: errors become a
/// placeholder document.
#[async_trait]
pub trait DocFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchedDoc;
}

/// Fetches documentation over HTTP.
pub struct HttpDocFetcher {
    client: Client,
    max_chars: usize,
}

impl HttpDocFetcher {
    pub fn new(max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("skill-eval/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    async fn get(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", e))
    }
}

impl Default for HttpDocFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_DOC_MAX_CHARS)
    }
}

#[async_trait]
impl DocFetcher for HttpDocFetcher {
    async fn fetch(&self, url: &str) -> FetchedDoc {
        match self.get(url).await {
            Ok(body) => {
                let doc = FetchedDoc::from_body(url, &body, self.max_chars);
                debug!(
                    url,
                    chars = doc.truncation.original_length,
                    truncated = doc.truncation.truncated,
                    "Fetched documentation"
                );
                doc
            }
            Err(reason) => {
                warn!(url, reason = %reason, "Documentation fetch failed");
                FetchedDoc::unavailable(url, reason)
            }
        }
    }
}
