//! Text anchor resolution
//!
//! Turns a body id into the text span its annotation covers, expressed in
//! absolute lines or relative to an enclosing ancestor, and runs the
//! paginated range queries used to list neighbouring annotations.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use broccoli::resolver::OffsetResolver;
//!
//! let resolver = OffsetResolver::new(store, text_source, "volume-1728");
//!
//! let span = resolver.resolve_absolute("urn:republic:session-1728-06-19-ordinaris-num-1-resolution-16").await?;
//! let (frame, range) = resolver.relative_to(&span, "Session").await?;
//! ```

mod offsets;
mod overlap;
mod types;

pub use offsets::{markers_for, text_anchor, OffsetResolver};
pub use overlap::{body_type_allowed, collect_pages, first_matching_page, DEFAULT_MAX_PAGES};
pub use types::{
    AbsoluteSpan, Location, RelativeLocation, RelativeTo, TextAnchor, TextResult, ORIGIN,
};
