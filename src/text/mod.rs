//! Text module
//!
//! Line-oriented text: fetching it from a text source and pointing into it
//! with markers.

mod markers;
mod source;

pub use markers::{line_length, TextMarker, TextRange};
pub use source::{TextRepoClient, TextSource};

#[cfg(test)]
pub use source::MockTextSource;
