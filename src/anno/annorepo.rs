//! AnnoRepo HTTP client
//!
//! Implements [`AnnotationStore`] against an AnnoRepo server. All calls are
//! reads, so transient failures are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode, Url};
use serde_json::json;

use super::store::{AnnotationStore, RangeQuery, SearchPage};
use super::types::{decode_page, AnnotationPage};
use crate::error::ResolveError;

/// How often and how patiently to retry idempotent calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Timeouts, refused connects and connections dropped mid-exchange
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Client for one AnnoRepo server
pub struct AnnoRepoClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl AnnoRepoClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, ResolveError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ResolveError::Upstream(format!("Invalid AnnoRepo URL {}: {}", base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            retry,
        })
    }

    fn service_url(&self, container: &str, operation: &str) -> String {
        format!(
            "{}/services/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(container),
            operation
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a request, retrying transport failures and gateway errors
    async fn send<F>(&self, what: &str, build: F) -> Result<Response, ResolveError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match self.authorize(build()).send().await {
                Ok(response)
                    if is_retryable_status(response.status()) && attempt < self.retry.attempts =>
                {
                    tracing::warn!(
                        "{} returned {} (attempt {}/{}), retrying",
                        what,
                        response.status(),
                        attempt,
                        self.retry.attempts
                    );
                }
                Ok(response) => return check_status(what, response).await,
                Err(e) if is_transient(&e) && attempt < self.retry.attempts => {
                    tracing::warn!(
                        "{} failed: {} (attempt {}/{}), retrying",
                        what,
                        e,
                        attempt,
                        self.retry.attempts
                    );
                }
                Err(e) => return Err(ResolveError::Upstream(format!("{}: {}", what, e))),
            }

            tokio::time::sleep(self.retry.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn fetch_page(&self, what: &str, build: impl Fn() -> RequestBuilder) -> Result<AnnotationPage, ResolveError> {
        let response = self.send(what, build).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResolveError::Upstream(format!("{}: reading body: {}", what, e)))?;
        decode_page(&bytes)
    }

    async fn range_search(
        &self,
        operation: &str,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        let url = self.service_url(container, operation);
        let params = [
            ("target.source", range.source.to_string()),
            ("range.start", range.start.to_string()),
            ("range.end", range.end.to_string()),
            ("page", page.to_string()),
        ];
        tracing::debug!(
            "{} {}..={} on {} (page {})",
            operation,
            range.start,
            range.end,
            range.source,
            page
        );

        let result = self
            .fetch_page(operation, || self.client.get(&url).query(&params))
            .await?;
        Ok(SearchPage::from_items(result.items))
    }
}

/// Map non-success statuses onto the resolve taxonomy
async fn check_status(what: &str, response: Response) -> Result<Response, ResolveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ResolveError::Unauthorized(
            format!("{} rejected credentials ({})", what, status),
        )),
        _ => Err(ResolveError::Upstream(format!(
            "{} returned {}: {}",
            what, status, body
        ))),
    }
}

#[async_trait]
impl AnnotationStore for AnnoRepoClient {
    async fn find_by_body_id(
        &self,
        container: &str,
        body_id: &str,
    ) -> Result<AnnotationPage, ResolveError> {
        let url = self.service_url(container, "search");
        let query = json!({ "body.id": body_id });

        let created = self
            .send("create search", || self.client.post(&url).json(&query))
            .await?;

        let location = created
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ResolveError::Upstream("search created without a Location header".to_string())
            })?;
        let search_url = self
            .base_url
            .join(location)
            .map_err(|e| ResolveError::Upstream(format!("bad search location {}: {}", location, e)))?;
        tracing::debug!("search for {} at {}", body_id, search_url);

        let page = self
            .fetch_page("fetch search result", || {
                self.client.get(search_url.clone()).query(&[("page", "0")])
            })
            .await?;

        if page.is_empty() {
            return Err(ResolveError::NotFound(body_id.to_string()));
        }
        Ok(page)
    }

    async fn search_overlapping(
        &self,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        self.range_search("overlapping_with_range", container, range, page)
            .await
    }

    async fn search_within_range(
        &self,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        self.range_search("within_range", container, range, page).await
    }
}
