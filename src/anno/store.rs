//! Annotation store abstraction
//!
//! Defines the trait the resolver talks to. The HTTP implementation lives in
//! `annorepo`; tests use the in-memory [`MockStore`].

use async_trait::async_trait;

use super::types::{Annotation, AnnotationPage};
use crate::error::ResolveError;

/// A line range on a text source, used for range searches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery<'a> {
    pub source: &'a str,
    pub start: usize,
    pub end: usize,
}

/// One page of a range search
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<Annotation>,
    /// Whether another page may follow
    pub has_more: bool,
}

impl SearchPage {
    /// A page whose continuation is signalled by being non-empty
    pub fn from_items(items: Vec<Annotation>) -> Self {
        let has_more = !items.is_empty();
        Self { items, has_more }
    }
}

/// Which range search to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Annotations intersecting the range
    #[default]
    Overlapping,
    /// Annotations within the range
    Within,
}

/// Read-only access to an annotation store
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Fetch the annotations whose body id is `body_id`
    async fn find_by_body_id(
        &self,
        container: &str,
        body_id: &str,
    ) -> Result<AnnotationPage, ResolveError>;

    /// One page of the "overlapping with range" search
    async fn search_overlapping(
        &self,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError>;

    /// One page of the "within range" search
    async fn search_within_range(
        &self,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError>;

    /// Dispatch on [`SearchMode`]
    async fn search(
        &self,
        mode: SearchMode,
        container: &str,
        range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        match mode {
            SearchMode::Overlapping => self.search_overlapping(container, range, page).await,
            SearchMode::Within => self.search_within_range(container, range, page).await,
        }
    }
}

/// In-memory store for tests
#[cfg(test)]
pub struct MockStore {
    /// Annotations served by `find_by_body_id`, keyed by body id
    pub by_body_id: std::collections::HashMap<String, AnnotationPage>,
    /// Pages served by `search_overlapping`; past the end an empty page is returned
    pub overlap_pages: Vec<Vec<Annotation>>,
    /// Pages served by `search_within_range`
    pub within_pages: Vec<Vec<Annotation>>,
    /// Pages requested so far, in order
    pub requested: std::sync::Mutex<Vec<(SearchMode, usize)>>,
}

#[cfg(test)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            by_body_id: std::collections::HashMap::new(),
            overlap_pages: Vec::new(),
            within_pages: Vec::new(),
            requested: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_annotation(mut self, body_id: &str, annotation: Annotation) -> Self {
        self.by_body_id
            .entry(body_id.to_string())
            .or_default()
            .items
            .push(annotation);
        self
    }

    pub fn with_overlap_pages(mut self, pages: Vec<Vec<Annotation>>) -> Self {
        self.overlap_pages = pages;
        self
    }

    pub fn with_within_pages(mut self, pages: Vec<Vec<Annotation>>) -> Self {
        self.within_pages = pages;
        self
    }

    pub fn requested(&self) -> Vec<(SearchMode, usize)> {
        self.requested.lock().unwrap().clone()
    }

    fn serve(&self, mode: SearchMode, pages: &[Vec<Annotation>], page: usize) -> SearchPage {
        self.requested.lock().unwrap().push((mode, page));
        SearchPage::from_items(pages.get(page).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[async_trait]
impl AnnotationStore for MockStore {
    async fn find_by_body_id(
        &self,
        _container: &str,
        body_id: &str,
    ) -> Result<AnnotationPage, ResolveError> {
        self.by_body_id
            .get(body_id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(body_id.to_string()))
    }

    async fn search_overlapping(
        &self,
        _container: &str,
        _range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        Ok(self.serve(SearchMode::Overlapping, &self.overlap_pages, page))
    }

    async fn search_within_range(
        &self,
        _container: &str,
        _range: &RangeQuery<'_>,
        page: usize,
    ) -> Result<SearchPage, ResolveError> {
        Ok(self.serve(SearchMode::Within, &self.within_pages, page))
    }
}
