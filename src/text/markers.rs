//! Text markers and ranges
//!
//! A [`TextMarker`] points at a character on a line of a segmented text. A
//! [`TextRange`] pairs a start and end marker. Re-basing a range expresses it
//! relative to another line without touching offsets or lengths.

use serde::Serialize;

use crate::error::ResolveError;

/// Number of characters on a line
pub fn line_length(line: &str) -> usize {
    line.chars().count()
}

/// A position within a line of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMarker {
    pub line: i64,
    pub char_offset: usize,
    /// Length of the line the marker points into
    pub line_length: usize,
}

impl TextMarker {
    /// A marker on a character of the line.
    ///
    /// On a non-empty line the offset must fall inside it.
    pub fn new(line: i64, char_offset: usize, line_length: usize) -> Result<Self, ResolveError> {
        if line_length > 0 && char_offset >= line_length {
            return Err(ResolveError::MalformedSelector(format!(
                "offset {} outside line {} of length {}",
                char_offset, line, line_length
            )));
        }
        Ok(Self {
            line,
            char_offset,
            line_length,
        })
    }

    /// An end marker, which may also sit just past the last character
    pub fn end(line: i64, char_offset: usize, line_length: usize) -> Result<Self, ResolveError> {
        if char_offset == line_length {
            return Ok(Self {
                line,
                char_offset,
                line_length,
            });
        }
        Self::new(line, char_offset, line_length)
    }

    pub fn rebase(&self, origin_line: i64) -> Self {
        Self {
            line: self.line - origin_line,
            ..*self
        }
    }
}

/// A start/end marker pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub start: TextMarker,
    pub end: TextMarker,
}

impl TextRange {
    /// Pair two markers; the start may not come after the end
    pub fn new(start: TextMarker, end: TextMarker) -> Result<Self, ResolveError> {
        let ordered = start.line < end.line
            || (start.line == end.line && start.char_offset <= end.char_offset);
        if !ordered {
            return Err(ResolveError::MalformedSelector(format!(
                "range starts at {}:{} but ends at {}:{}",
                start.line, start.char_offset, end.line, end.char_offset
            )));
        }
        Ok(Self { start, end })
    }

    /// The same range with lines counted from `origin_line`
    pub fn rebase(&self, origin_line: i64) -> Self {
        Self {
            start: self.start.rebase(origin_line),
            end: self.end.rebase(origin_line),
        }
    }
}
