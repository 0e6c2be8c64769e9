//! Resolver result types

use serde::Serialize;

use crate::anno::Selector;
use crate::text::{TextMarker, TextRange};

/// Ancestor type meaning "no re-basing"
pub const ORIGIN: &str = "Origin";

/// The Text target a selector applies to
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnchor {
    /// Segment source the selector's lines refer to
    pub source: String,
    pub selector: Selector,
}

/// An annotation's absolute span with the text it was measured against
#[derive(Debug, Clone)]
pub struct AbsoluteSpan {
    pub lines: Vec<String>,
    pub range: TextRange,
    pub anchor: TextAnchor,
}

/// The coordinate frame of a resolved range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelativeLocation {
    /// Absolute line numbers
    Origin,
    /// Lines counted from the start of an enclosing annotation
    Ancestor {
        ancestor_type: String,
        body_id: String,
    },
}

/// `relativeTo` as rendered to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelativeTo {
    #[serde(rename = "type")]
    pub anchor_type: String,
    #[serde(rename = "bodyId")]
    pub body_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub relative_to: RelativeTo,
    pub start: TextMarker,
    pub end: TextMarker,
}

impl Location {
    /// Render a location; an Origin frame names the annotation itself
    pub fn new(self_body_id: &str, relative: &RelativeLocation, range: &TextRange) -> Self {
        let relative_to = match relative {
            RelativeLocation::Origin => RelativeTo {
                anchor_type: ORIGIN.to_string(),
                body_id: self_body_id.to_string(),
            },
            RelativeLocation::Ancestor {
                ancestor_type,
                body_id,
            } => RelativeTo {
                anchor_type: ancestor_type.clone(),
                body_id: body_id.clone(),
            },
        };

        Self {
            relative_to,
            start: range.start,
            end: range.end,
        }
    }
}

/// The `text` section of a body id response
#[derive(Debug, Clone, Serialize)]
pub struct TextResult {
    pub location: Location,
    pub lines: Vec<String>,
}
