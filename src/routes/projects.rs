//! Project API endpoints
//!
//! Lists configured projects and assembles annotations, text and IIIF
//! details for a body id.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::anno::{Annotation, AnnotationPage, SearchMode};
use crate::error::{AppError, ResolveError, Result};
use crate::iiif::IiifContext;
use crate::resolver::{text_anchor, OffsetResolver, TextResult, ORIGIN};
use crate::state::AppState;

const ANNO: &str = "anno";
const TEXT: &str = "text";
const IIIF: &str = "iiif";
const ALL_INCLUDES: [&str; 3] = [ANNO, TEXT, IIIF];

/// Create the projects router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/:project_id/:body_id", get(get_project_body_id))
}

/// Query parameters for body id lookups
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyIdParams {
    include_results: Option<String>,
    overlap_types: Option<String>,
    overlap_mode: Option<String>,
    #[serde(default = "default_relative_to")]
    relative_to: String,
}

fn default_relative_to() -> String {
    ORIGIN.to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEcho {
    pub project_id: String,
    pub body_id: String,
    pub include_results: BTreeSet<String>,
    pub overlap_types: Option<BTreeSet<String>>,
    pub overlap_mode: &'static str,
    pub relative_to: String,
}

#[derive(Debug, Serialize)]
pub struct BodyIdResponse {
    pub request: RequestEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anno: Option<Vec<Annotation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iiif: Option<IiifContext>,
}

/// Get configured projects
async fn list_projects(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.project_names())
}

/// Get a project's annotations, text and IIIF details by body id
async fn get_project_body_id(
    State(state): State<AppState>,
    Path((project_id, body_id)): Path<(String, String)>,
    Query(params): Query<BodyIdParams>,
) -> Result<Json<BodyIdResponse>> {
    tracing::info!(
        "project={}, bodyId={}, relativeTo={}, include={:?}",
        project_id,
        body_id,
        params.relative_to,
        params.include_results
    );

    let project = state.project(&project_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "Unknown project: {}. See /projects for known projects",
            project_id
        ))
    })?;

    let includes = parse_include_results(params.include_results.as_deref())?;
    let overlap_types = params
        .overlap_types
        .as_deref()
        .map(parse_name_list)
        .transpose()?;
    let mode = parse_overlap_mode(params.overlap_mode.as_deref())?;

    let resolver = &project.resolver;
    let page = resolver.find(&body_id).await?;

    let anno = async {
        if includes.contains(ANNO) {
            anno_section(resolver, &page, overlap_types.as_ref(), mode)
                .await
                .map(Some)
        } else {
            Ok(None)
        }
    };
    let text = async {
        if includes.contains(TEXT) {
            resolver
                .resolve_text(&body_id, &page, &params.relative_to)
                .await
                .map(Some)
        } else {
            Ok(None)
        }
    };
    let (anno, text) = futures::try_join!(anno, text)?;

    let iiif = includes
        .contains(IIIF)
        .then(|| IiifContext::for_page(project.iiif_manifest.as_deref(), &body_id, &page));

    Ok(Json(BodyIdResponse {
        request: RequestEcho {
            project_id,
            body_id,
            include_results: includes,
            overlap_types,
            overlap_mode: match mode {
                SearchMode::Overlapping => "overlap",
                SearchMode::Within => "within",
            },
            relative_to: params.relative_to,
        },
        anno,
        text,
        iiif,
    }))
}

/// The annotation's own items, or its neighbours when types are requested
async fn anno_section(
    resolver: &OffsetResolver,
    page: &AnnotationPage,
    overlap_types: Option<&BTreeSet<String>>,
    mode: SearchMode,
) -> std::result::Result<Vec<Annotation>, ResolveError> {
    let Some(types) = overlap_types else {
        return Ok(page.items().to_vec());
    };

    let anchor = text_anchor(page)?;
    resolver
        .fetch_range(
            mode,
            &anchor.source,
            anchor.selector.start,
            anchor.selector.end,
            types,
        )
        .await
}

fn parse_include_results(raw: Option<&str>) -> Result<BTreeSet<String>> {
    let all: BTreeSet<String> = ALL_INCLUDES.iter().map(|s| s.to_string()).collect();

    let Some(raw) = raw else {
        return Ok(all);
    };

    let requested = parse_name_list(raw)?;
    let undefined: Vec<&String> = requested.difference(&all).collect();
    if !undefined.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Undefined include: {:?} not in {:?}",
            undefined, all
        )));
    }

    Ok(requested)
}

/// Parse `["a","b"]`, `a,b` or `"a,b"` into a set of names
fn parse_name_list(raw: &str) -> Result<BTreeSet<String>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid list {}: {}", raw, e)));
    }

    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    Ok(unquoted
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_overlap_mode(raw: Option<&str>) -> Result<SearchMode> {
    match raw {
        None | Some("overlap") => Ok(SearchMode::Overlapping),
        Some("within") => Ok(SearchMode::Within),
        Some(other) => Err(AppError::BadRequest(format!(
            "Undefined overlapMode: {} not in [overlap, within]",
            other
        ))),
    }
}
