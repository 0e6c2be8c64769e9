//! Line/character selectors for Text targets
//!
//! A selector narrows a Text target to lines `start..=end` of a segmented
//! text source, optionally cut at a character offset on the first and last
//! line. Offsets are left as found; callers pick the defaults.

use serde::Serialize;
use serde_json::Value;

use crate::error::ResolveError;

/// Character-offset selector on a segmented text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Selector type as sent by the store (e.g. `urn:republic:TextAnchorSelector`)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub selector_type: Option<String>,
    /// First line (inclusive)
    pub start: usize,
    /// Last line (inclusive)
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_char_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_char_offset: Option<usize>,
}

impl Selector {
    /// Parse a raw JSON selector.
    ///
    /// `start` and `end` must be present non-negative integers. The char
    /// offsets are optional but must be integers when present.
    pub fn parse(raw: &Value) -> Result<Self, ResolveError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ResolveError::MalformedSelector(format!("not an object: {}", raw)))?;

        let selector_type = obj.get("type").and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            selector_type,
            start: required_index(raw, "start")?,
            end: required_index(raw, "end")?,
            begin_char_offset: optional_index(raw, "beginCharOffset")?,
            end_char_offset: optional_index(raw, "endCharOffset")?,
        })
    }

    pub fn begin_char_offset(&self) -> Option<usize> {
        self.begin_char_offset
    }

    pub fn end_char_offset(&self) -> Option<usize> {
        self.end_char_offset
    }

    /// Whether this selector's line range covers `start..=end`
    pub fn encloses(&self, start: usize, end: usize) -> bool {
        self.start <= start && self.end >= end
    }
}

fn required_index(raw: &Value, field: &str) -> Result<usize, ResolveError> {
    optional_index(raw, field)?
        .ok_or_else(|| ResolveError::MalformedSelector(format!("missing '{}' in {}", field, raw)))
}

fn optional_index(raw: &Value, field: &str) -> Result<Option<usize>, ResolveError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                ResolveError::MalformedSelector(format!(
                    "'{}' is not a non-negative integer: {}",
                    field, value
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_selector() {
        let selector = Selector::parse(&json!({
            "type": "urn:republic:TextAnchorSelector",
            "start": 10,
            "end": 12,
            "beginCharOffset": 5,
            "endCharOffset": 7
        }))
        .unwrap();

        assert_eq!(selector.start, 10);
        assert_eq!(selector.end, 12);
        assert_eq!(selector.begin_char_offset(), Some(5));
        assert_eq!(selector.end_char_offset(), Some(7));
        assert_eq!(
            selector.selector_type.as_deref(),
            Some("urn:republic:TextAnchorSelector")
        );
    }

    #[test]
    fn test_parse_leaves_offsets_unset() {
        let selector = Selector::parse(&json!({"start": 3, "end": 4})).unwrap();
        assert_eq!(selector.begin_char_offset(), None);
        assert_eq!(selector.end_char_offset(), None);
    }

    #[test]
    fn test_parse_missing_end_is_malformed() {
        let result = Selector::parse(&json!({"start": 3}));
        assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
    }

    #[test]
    fn test_parse_non_integer_start_is_malformed() {
        for bad in [json!("3"), json!(3.5), json!(-1)] {
            let result = Selector::parse(&json!({"start": bad, "end": 4}));
            assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
        }
    }

    #[test]
    fn test_parse_non_object_is_malformed() {
        let result = Selector::parse(&json!("xywh=0,0,10,10"));
        assert!(matches!(result, Err(ResolveError::MalformedSelector(_))));
    }

    #[test]
    fn test_encloses() {
        let selector = Selector::parse(&json!({"start": 8, "end": 20})).unwrap();
        assert!(selector.encloses(10, 12));
        assert!(selector.encloses(8, 20));
        assert!(!selector.encloses(7, 12));
        assert!(!selector.encloses(10, 21));
    }
}
