//! Offset resolution
//!
//! Locates the text span an annotation covers: its line text, absolute
//! start/end markers, and optionally those markers re-based onto an
//! enclosing ancestor annotation.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::overlap::{body_type_allowed, collect_pages, first_matching_page, DEFAULT_MAX_PAGES};
use super::types::{AbsoluteSpan, Location, RelativeLocation, TextAnchor, TextResult, ORIGIN};
use crate::anno::{
    Annotation, AnnotationPage, AnnotationStore, RangeQuery, SearchMode, Selector, Target,
    TargetType,
};
use crate::error::ResolveError;
use crate::text::{line_length, TextMarker, TextRange, TextSource};

/// Resolves annotations of one container against their text
pub struct OffsetResolver {
    store: Arc<dyn AnnotationStore>,
    text: Arc<dyn TextSource>,
    container: String,
    max_pages: usize,
}

impl OffsetResolver {
    pub fn new(store: Arc<dyn AnnotationStore>, text: Arc<dyn TextSource>, container: &str) -> Self {
        Self {
            store,
            text,
            container: container.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Bound the number of pages any single search may walk
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Fetch the annotations for `body_id`
    pub async fn find(&self, body_id: &str) -> Result<AnnotationPage, ResolveError> {
        let page = self.store.find_by_body_id(&self.container, body_id).await?;
        if page.is_empty() {
            return Err(ResolveError::NotFound(body_id.to_string()));
        }
        tracing::debug!("found {} annotation(s) for {}", page.items().len(), body_id);
        Ok(page)
    }

    /// The absolute span of the annotation with `body_id`
    pub async fn resolve_absolute(&self, body_id: &str) -> Result<AbsoluteSpan, ResolveError> {
        let page = self.find(body_id).await?;
        self.span_of(&page).await
    }

    /// The absolute span of an already fetched annotation page
    pub async fn span_of(&self, page: &AnnotationPage) -> Result<AbsoluteSpan, ResolveError> {
        let lines_target = pick_first(page.without_selector(&TargetType::Text), "without selector")?;
        tracing::info!("text target without selector: {}", lines_target.source);
        let anchor = text_anchor(page)?;

        let lines = self.text.fetch_lines(&lines_target.source).await?;
        let range = markers_for(&anchor.selector, &lines)?;
        tracing::debug!("markers (absolute): {:?}", range);

        Ok(AbsoluteSpan {
            lines,
            range,
            anchor,
        })
    }

    /// The annotation's range, re-based onto its enclosing `ancestor_type`
    pub async fn resolve_relative_to(
        &self,
        body_id: &str,
        ancestor_type: &str,
    ) -> Result<(RelativeLocation, TextRange), ResolveError> {
        let span = self.resolve_absolute(body_id).await?;
        self.relative_to(&span, ancestor_type).await
    }

    /// Re-base an absolute span onto its enclosing `ancestor_type`.
    ///
    /// `Origin` leaves the range untouched.
    pub async fn relative_to(
        &self,
        span: &AbsoluteSpan,
        ancestor_type: &str,
    ) -> Result<(RelativeLocation, TextRange), ResolveError> {
        if ancestor_type == ORIGIN {
            return Ok((RelativeLocation::Origin, span.range));
        }

        let (ancestor_body_id, ancestor_start) =
            self.find_ancestor(&span.anchor, ancestor_type).await?;
        let relative = span.range.rebase(ancestor_start);
        tracing::debug!("markers (relative to {}): {:?}", ancestor_body_id, relative);

        Ok((
            RelativeLocation::Ancestor {
                ancestor_type: ancestor_type.to_string(),
                body_id: ancestor_body_id,
            },
            relative,
        ))
    }

    /// The `text` section for an annotation page
    pub async fn resolve_text(
        &self,
        body_id: &str,
        page: &AnnotationPage,
        relative_to: &str,
    ) -> Result<TextResult, ResolveError> {
        let span = self.span_of(page).await?;
        let (relative, range) = self.relative_to(&span, relative_to).await?;
        Ok(TextResult {
            location: Location::new(body_id, &relative, &range),
            lines: span.lines,
        })
    }

    /// Locate the `ancestor_type` annotation enclosing `anchor`.
    ///
    /// Paging stops at the first page with an enclosing candidate. Returns
    /// the ancestor's body id and absolute start line.
    async fn find_ancestor(
        &self,
        anchor: &TextAnchor,
        ancestor_type: &str,
    ) -> Result<(String, i64), ResolveError> {
        let selector = &anchor.selector;
        let range = RangeQuery {
            source: &anchor.source,
            start: selector.start,
            end: selector.end,
        };

        let candidates = first_matching_page(
            self.store.as_ref(),
            &self.container,
            SearchMode::Overlapping,
            &range,
            self.max_pages,
            |a| {
                a.body_type() == ancestor_type
                    && a.text_anchor_on(&anchor.source)
                        .is_some_and(|s| s.encloses(selector.start, selector.end))
            },
        )
        .await?;

        let ancestor = match candidates.as_slice() {
            [] => {
                return Err(ResolveError::AncestorNotFound {
                    ancestor_type: ancestor_type.to_string(),
                    text_source: anchor.source.clone(),
                    start: selector.start,
                    end: selector.end,
                })
            }
            [only] => only,
            [first, ..] => {
                tracing::warn!(
                    "{} '{}' annotations enclose lines {}..={}, arbitrarily picking {}",
                    candidates.len(),
                    ancestor_type,
                    selector.start,
                    selector.end,
                    first.body_id()
                );
                first
            }
        };

        let start = ancestor
            .text_anchor_on(&anchor.source)
            .map(|s| s.start as i64)
            .ok_or_else(|| {
                ResolveError::MissingTarget(format!(
                    "ancestor {} has no Text selector on {}",
                    ancestor.body_id(),
                    anchor.source
                ))
            })?;

        Ok((ancestor.body_id().to_string(), start))
    }

    /// Annotations overlapping lines `start..=end` of `source`
    pub async fn fetch_overlap(
        &self,
        source: &str,
        start: usize,
        end: usize,
        allowed_body_types: &BTreeSet<String>,
    ) -> Result<Vec<Annotation>, ResolveError> {
        self.fetch_range(SearchMode::Overlapping, source, start, end, allowed_body_types)
            .await
    }

    /// Annotations within lines `start..=end` of `source`
    pub async fn fetch_within(
        &self,
        source: &str,
        start: usize,
        end: usize,
        allowed_body_types: &BTreeSet<String>,
    ) -> Result<Vec<Annotation>, ResolveError> {
        self.fetch_range(SearchMode::Within, source, start, end, allowed_body_types)
            .await
    }

    pub async fn fetch_range(
        &self,
        mode: SearchMode,
        source: &str,
        start: usize,
        end: usize,
        allowed_body_types: &BTreeSet<String>,
    ) -> Result<Vec<Annotation>, ResolveError> {
        let range = RangeQuery { source, start, end };
        let items = collect_pages(
            self.store.as_ref(),
            &self.container,
            mode,
            &range,
            self.max_pages,
            |a| body_type_allowed(a, allowed_body_types),
        )
        .await?;
        tracing::info!(
            "{:?} {}..={}: {} annotation(s) of {:?}",
            mode,
            start,
            end,
            items.len(),
            allowed_body_types
        );
        Ok(items)
    }
}

/// The first target, noting when there was a choice
fn pick_first<'a>(candidates: Vec<&'a Target>, what: &str) -> Result<&'a Target, ResolveError> {
    match candidates.len() {
        0 => Err(ResolveError::MissingTarget(format!(
            "no 'Text' target {} found",
            what
        ))),
        1 => Ok(candidates[0]),
        n => {
            tracing::warn!(
                "{} 'Text' targets {}, arbitrarily picking the first",
                n,
                what
            );
            Ok(candidates[0])
        }
    }
}

/// The Text-with-selector target of an annotation page
pub fn text_anchor(page: &AnnotationPage) -> Result<TextAnchor, ResolveError> {
    let target = pick_first(page.with_selector(&TargetType::Text), "with selector")?;
    let selector = target.text_selector().cloned().ok_or_else(|| {
        ResolveError::MalformedSelector(format!("Text target on {} has no line selector", target.source))
    })?;
    Ok(TextAnchor {
        source: target.source.clone(),
        selector,
    })
}

/// Absolute markers for `selector` over `lines`.
///
/// A missing begin offset means the line start, a missing end offset the
/// last character of the end line (0 on an empty line).
pub fn markers_for(selector: &Selector, lines: &[String]) -> Result<TextRange, ResolveError> {
    let length_of = |index: usize| {
        lines.get(index).map(|l| line_length(l)).ok_or_else(|| {
            ResolveError::MalformedSelector(format!(
                "line {} outside text of {} lines",
                index,
                lines.len()
            ))
        })
    };

    let start_length = length_of(selector.start)?;
    let start = TextMarker::new(
        selector.start as i64,
        selector.begin_char_offset().unwrap_or(0),
        start_length,
    )?;

    let end_length = length_of(selector.end)?;
    let end_offset = selector
        .end_char_offset()
        .unwrap_or_else(|| end_length.saturating_sub(1));
    let end = TextMarker::end(selector.end as i64, end_offset, end_length)?;

    TextRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anno::{AnnotationBody, MockStore, TargetSelector};
    use crate::text::MockTextSource;

    const LINES_SOURCE: &str = "https://textrepo.example/api/view/versions/42/segments/index/0/20";
    const SEGMENTS: &str = "https://textrepo.example/api/rest/versions/42/contents";
    const RESOLUTION: &str = "urn:republic:session-1728-06-19-ordinaris-num-1-resolution-16";
    const SESSION: &str = "urn:republic:session-1728-06-19-ordinaris-num-1";

    /// Twenty lines; lines 10, 11 and 12 have lengths 20, 15 and 30
    fn text_lines() -> Vec<String> {
        (0..20)
            .map(|i| match i {
                10 => "a".repeat(20),
                11 => "b".repeat(15),
                12 => "c".repeat(30),
                _ => format!("line {}", i),
            })
            .collect()
    }

    fn selector(start: usize, end: usize, begin: Option<usize>, finish: Option<usize>) -> Selector {
        Selector {
            selector_type: Some("urn:republic:TextAnchorSelector".to_string()),
            start,
            end,
            begin_char_offset: begin,
            end_char_offset: finish,
        }
    }

    fn text_target(source: &str, selector: Option<Selector>) -> Target {
        Target {
            target_type: TargetType::Text,
            source: source.to_string(),
            selector: selector.map(TargetSelector::Text),
        }
    }

    fn annotation(body_id: &str, body_type: &str, targets: Vec<Target>) -> Annotation {
        Annotation {
            id: format!("https://annorepo.example/w3c/volume-1728/{}", body_type),
            body: AnnotationBody {
                body_type: body_type.to_string(),
                value: None,
                id: Some(body_id.to_string()),
            },
            targets,
        }
    }

    fn resolution() -> Annotation {
        annotation(
            RESOLUTION,
            "Resolution",
            vec![
                text_target(LINES_SOURCE, None),
                text_target(SEGMENTS, Some(selector(10, 12, Some(5), None))),
            ],
        )
    }

    fn session(body_id: &str, start: usize, end: usize) -> Annotation {
        annotation(
            body_id,
            "Session",
            vec![text_target(SEGMENTS, Some(selector(start, end, None, None)))],
        )
    }

    fn resolver(store: MockStore) -> OffsetResolver {
        let text = MockTextSource::new().with_text(LINES_SOURCE, text_lines());
        OffsetResolver::new(Arc::new(store), Arc::new(text), "volume-1728")
    }

    #[tokio::test]
    async fn test_resolve_absolute() {
        let resolver = resolver(MockStore::new().with_annotation(RESOLUTION, resolution()));

        let span = resolver.resolve_absolute(RESOLUTION).await.unwrap();

        assert_eq!(span.lines.len(), 20);
        assert_eq!(span.range.start, TextMarker::new(10, 5, 20).unwrap());
        assert_eq!(span.range.end, TextMarker::new(12, 29, 30).unwrap());
        assert_eq!(span.anchor.source, SEGMENTS);
    }

    #[tokio::test]
    async fn test_relative_to_origin_is_unchanged() {
        let store = MockStore::new().with_annotation(RESOLUTION, resolution());
        let resolver = resolver(store);
        let page = resolver.find(RESOLUTION).await.unwrap();

        let text = resolver.resolve_text(RESOLUTION, &page, ORIGIN).await.unwrap();

        assert_eq!(text.location.relative_to.anchor_type, "Origin");
        assert_eq!(text.location.relative_to.body_id, RESOLUTION);
        assert_eq!(text.location.start, TextMarker::new(10, 5, 20).unwrap());
        assert_eq!(text.location.end, TextMarker::new(12, 29, 30).unwrap());
    }

    #[tokio::test]
    async fn test_relative_to_session() {
        let store = MockStore::new()
            .with_annotation(RESOLUTION, resolution())
            .with_overlap_pages(vec![vec![resolution(), session(SESSION, 8, 19)]]);
        let resolver = resolver(store);

        let (relative, range) = resolver
            .resolve_relative_to(RESOLUTION, "Session")
            .await
            .unwrap();

        assert_eq!(
            relative,
            RelativeLocation::Ancestor {
                ancestor_type: "Session".to_string(),
                body_id: SESSION.to_string(),
            }
        );
        assert_eq!(range.start, TextMarker::new(2, 5, 20).unwrap());
        assert_eq!(range.end, TextMarker::new(4, 29, 30).unwrap());
    }

    #[tokio::test]
    async fn test_ancestor_must_enclose_target() {
        let store = MockStore::new()
            .with_annotation(RESOLUTION, resolution())
            .with_overlap_pages(vec![vec![
                // overlaps but starts after the resolution
                session("urn:session-late", 11, 19),
                session(SESSION, 8, 19),
            ]]);
        let resolver = resolver(store);

        let (relative, range) = resolver
            .resolve_relative_to(RESOLUTION, "Session")
            .await
            .unwrap();

        assert!(matches!(relative, RelativeLocation::Ancestor { body_id, .. } if body_id == SESSION));
        assert_eq!(range.start.line, 2);
    }

    #[tokio::test]
    async fn test_multiple_ancestors_picks_first() {
        let store = MockStore::new()
            .with_annotation(RESOLUTION, resolution())
            .with_overlap_pages(vec![vec![
                session("urn:session-a", 9, 12),
                session("urn:session-b", 0, 19),
            ]]);
        let resolver = resolver(store);

        let (relative, range) = resolver
            .resolve_relative_to(RESOLUTION, "Session")
            .await
            .unwrap();

        assert!(matches!(relative, RelativeLocation::Ancestor { body_id, .. } if body_id == "urn:session-a"));
        assert_eq!(range.start.line, 1);
    }

    #[tokio::test]
    async fn test_ancestor_on_dense_range_stops_paging() {
        let mut pages = vec![vec![resolution(), session(SESSION, 8, 19)]];
        pages.extend((0..10).map(|_| vec![resolution()]));
        let store = MockStore::new()
            .with_annotation(RESOLUTION, resolution())
            .with_overlap_pages(pages);
        let resolver = resolver(store).with_max_pages(3);

        let (relative, _) = resolver
            .resolve_relative_to(RESOLUTION, "Session")
            .await
            .unwrap();

        assert!(matches!(relative, RelativeLocation::Ancestor { body_id, .. } if body_id == SESSION));
    }

    #[tokio::test]
    async fn test_missing_ancestor() {
        let store = MockStore::new()
            .with_annotation(RESOLUTION, resolution())
            .with_overlap_pages(vec![vec![resolution()]]);
        let resolver = resolver(store);

        let result = resolver.resolve_relative_to(RESOLUTION, "Session").await;
        assert!(matches!(
            result,
            Err(ResolveError::AncestorNotFound { start: 10, end: 12, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_body_id_is_not_found() {
        let resolver = resolver(MockStore::new());
        let result = resolver.resolve_absolute("urn:republic:nothing").await;
        assert!(matches!(result, Err(ResolveError::NotFound(id)) if id == "urn:republic:nothing"));
    }

    #[tokio::test]
    async fn test_missing_lines_target() {
        let anno = annotation(
            RESOLUTION,
            "Resolution",
            vec![text_target(SEGMENTS, Some(selector(10, 12, None, None)))],
        );
        let resolver = resolver(MockStore::new().with_annotation(RESOLUTION, anno));

        let result = resolver.resolve_absolute(RESOLUTION).await;
        assert!(matches!(result, Err(ResolveError::MissingTarget(msg)) if msg.contains("without selector")));
    }

    #[tokio::test]
    async fn test_missing_selector_target() {
        let anno = annotation(RESOLUTION, "Resolution", vec![text_target(LINES_SOURCE, None)]);
        let resolver = resolver(MockStore::new().with_annotation(RESOLUTION, anno));

        let result = resolver.resolve_absolute(RESOLUTION).await;
        assert!(matches!(result, Err(ResolveError::MissingTarget(msg)) if msg.contains("with selector")));
    }

    #[tokio::test]
    async fn test_non_line_selector_anchor_is_malformed() {
        let anno = annotation(
            RESOLUTION,
            "Resolution",
            vec![
                text_target(LINES_SOURCE, None),
                Target {
                    target_type: TargetType::Text,
                    source: SEGMENTS.to_string(),
                    selector: Some(TargetSelector::Opaque(serde_json::json!({
                        "type": "TextQuoteSelector",
                        "exact": "resolutie"
                    }))),
                },
            ],
        );
        let resolver = resolver(MockStore::new().with_annotation(RESOLUTION, anno));

        let result = resolver.resolve_absolute(RESOLUTION).await;
        assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
    }

    #[tokio::test]
    async fn test_duplicate_targets_pick_first() {
        let anno = annotation(
            RESOLUTION,
            "Resolution",
            vec![
                text_target(LINES_SOURCE, None),
                text_target("https://textrepo.example/unused", None),
                text_target(SEGMENTS, Some(selector(10, 12, Some(5), None))),
                text_target(SEGMENTS, Some(selector(0, 1, None, None))),
            ],
        );
        let resolver = resolver(MockStore::new().with_annotation(RESOLUTION, anno));

        let span = resolver.resolve_absolute(RESOLUTION).await.unwrap();
        assert_eq!(span.range.start.line, 10);
    }

    #[tokio::test]
    async fn test_fetch_overlap_filters_types() {
        let store = MockStore::new().with_overlap_pages(vec![
            vec![resolution(), session(SESSION, 8, 19)],
            vec![resolution()],
        ]);
        let resolver = resolver(store);
        let allowed: BTreeSet<String> = ["Resolution".to_string()].into();

        let items = resolver
            .fetch_overlap(SEGMENTS, 10, 12, &allowed)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let everything = resolver
            .fetch_overlap(SEGMENTS, 10, 12, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_within_uses_within_search() {
        let store = MockStore::new().with_within_pages(vec![vec![session(SESSION, 10, 11)]]);
        let resolver = resolver(store);

        let items = resolver
            .fetch_within(SEGMENTS, 10, 12, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_overlap_bound_applies() {
        let pages = (0..5).map(|_| vec![resolution()]).collect();
        let resolver = resolver(MockStore::new().with_overlap_pages(pages)).with_max_pages(2);

        let result = resolver.fetch_overlap(SEGMENTS, 10, 12, &BTreeSet::new()).await;
        assert!(matches!(result, Err(ResolveError::PaginationExhausted { .. })));
    }

    #[test]
    fn test_markers_default_offsets() {
        let range = markers_for(&selector(10, 12, None, None), &text_lines()).unwrap();
        assert_eq!(range.start, TextMarker::new(10, 0, 20).unwrap());
        assert_eq!(range.end, TextMarker::new(12, 29, 30).unwrap());
    }

    #[test]
    fn test_markers_empty_last_line_clamps_to_zero() {
        let lines = vec!["first line".to_string(), String::new()];
        let range = markers_for(&selector(0, 1, None, None), &lines).unwrap();
        assert_eq!(range.end.char_offset, 0);
        assert_eq!(range.end.line_length, 0);
    }

    #[test]
    fn test_markers_single_line_span_never_negative() {
        let lines = vec!["x".to_string(), String::new(), "abc".to_string()];
        for line in 0..lines.len() {
            let range = markers_for(&selector(line, line, None, None), &lines).unwrap();
            assert!(range.end.char_offset >= range.start.char_offset);
        }
    }

    #[test]
    fn test_markers_explicit_end_of_line() {
        let range = markers_for(&selector(11, 11, Some(0), Some(15)), &text_lines()).unwrap();
        assert_eq!(range.end.char_offset, 15);
    }

    #[test]
    fn test_markers_reject_selector_past_text() {
        let result = markers_for(&selector(10, 25, None, None), &text_lines());
        assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
    }

    #[test]
    fn test_markers_reject_backwards_offsets() {
        let result = markers_for(&selector(11, 11, Some(9), Some(3)), &text_lines());
        assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
    }
}
