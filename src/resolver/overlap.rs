//! Paginated range queries
//!
//! Walks the pages of an overlap or within-range search, strictly in order,
//! until the store reports no further page.

use std::collections::BTreeSet;

use crate::anno::{Annotation, AnnotationStore, RangeQuery, SearchMode};
use crate::error::ResolveError;

/// Default bound on pages fetched for one query
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Collect every annotation `keep` accepts across all pages of a search.
///
/// At most `max_pages` non-empty pages are accepted; a store still reporting
/// more after that fails with `PaginationExhausted`.
pub async fn collect_pages<F>(
    store: &dyn AnnotationStore,
    container: &str,
    mode: SearchMode,
    range: &RangeQuery<'_>,
    max_pages: usize,
    keep: F,
) -> Result<Vec<Annotation>, ResolveError>
where
    F: Fn(&Annotation) -> bool,
{
    walk_pages(store, container, mode, range, max_pages, keep, false).await
}

/// Like [`collect_pages`], but stops after the first page holding a match.
///
/// Only that page's matches are returned; an empty result means no page
/// matched.
pub async fn first_matching_page<F>(
    store: &dyn AnnotationStore,
    container: &str,
    mode: SearchMode,
    range: &RangeQuery<'_>,
    max_pages: usize,
    keep: F,
) -> Result<Vec<Annotation>, ResolveError>
where
    F: Fn(&Annotation) -> bool,
{
    walk_pages(store, container, mode, range, max_pages, keep, true).await
}

async fn walk_pages<F>(
    store: &dyn AnnotationStore,
    container: &str,
    mode: SearchMode,
    range: &RangeQuery<'_>,
    max_pages: usize,
    keep: F,
    stop_at_match: bool,
) -> Result<Vec<Annotation>, ResolveError>
where
    F: Fn(&Annotation) -> bool,
{
    let mut items = Vec::new();
    let mut page = 0;

    loop {
        let result = store.search(mode, container, range, page).await?;
        tracing::debug!(
            "{:?} page {}: {} items (more: {})",
            mode,
            page,
            result.items.len(),
            result.has_more
        );
        items.extend(result.items.into_iter().filter(|a| keep(a)));

        if !result.has_more || (stop_at_match && !items.is_empty()) {
            return Ok(items);
        }

        page += 1;
        if page > max_pages {
            tracing::error!(
                "{:?} search on {} still paging after {} pages",
                mode,
                range.source,
                max_pages
            );
            return Err(ResolveError::PaginationExhausted { pages: page });
        }
    }
}

/// Whether `annotation` passes a body type filter; an empty filter passes all
pub fn body_type_allowed(annotation: &Annotation, allowed: &BTreeSet<String>) -> bool {
    allowed.is_empty() || allowed.contains(annotation.body_type())
}
