//! Text sources
//!
//! Fetches the ordered lines of a segmented text. TextRepo serves these as a
//! JSON array of strings; some hosts require Basic credentials.

use async_trait::async_trait;
use reqwest::{header, StatusCode};

use crate::error::ResolveError;

/// Source of line-oriented text
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Fetch all lines of `source`, in document order
    async fn fetch_lines(&self, source: &str) -> Result<Vec<String>, ResolveError>;
}

/// TextRepo HTTP client
pub struct TextRepoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TextRepoClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Whether `source` is served by this TextRepo
    pub fn can_resolve(&self, source: &str) -> bool {
        match source.strip_prefix(&self.base_url) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }

    fn credential_for(&self, source: &str) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|_| self.can_resolve(source))
    }
}

#[async_trait]
impl TextSource for TextRepoClient {
    async fn fetch_lines(&self, source: &str) -> Result<Vec<String>, ResolveError> {
        tracing::info!("GET {}", source);

        let mut request = self.client.get(source);
        if let Some(key) = self.credential_for(source) {
            tracing::debug!("using TextRepo credentials for {}", source);
            request = request.header(header::AUTHORIZATION, format!("Basic {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolveError::Upstream(format!("fetching {}: {}", source, e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("Auth failed fetching {}", source);
                Err(ResolveError::Unauthorized(format!(
                    "Need credentials for {}",
                    source
                )))
            }
            status if !status.is_success() => Err(ResolveError::Upstream(format!(
                "fetching {} returned {}",
                source, status
            ))),
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ResolveError::Upstream(format!("reading {}: {}", source, e)))?;
                Ok(serde_json::from_slice::<Vec<String>>(&bytes)?)
            }
        }
    }
}

/// In-memory text source for tests
#[cfg(test)]
pub struct MockTextSource {
    pub texts: std::collections::HashMap<String, Vec<String>>,
}

#[cfg(test)]
impl MockTextSource {
    pub fn new() -> Self {
        Self {
            texts: std::collections::HashMap::new(),
        }
    }

    pub fn with_text(mut self, source: &str, lines: Vec<String>) -> Self {
        self.texts.insert(source.to_string(), lines);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl TextSource for MockTextSource {
    async fn fetch_lines(&self, source: &str) -> Result<Vec<String>, ResolveError> {
        self.texts
            .get(source)
            .cloned()
            .ok_or_else(|| ResolveError::Upstream(format!("fetching {} returned 404", source)))
    }
}
