//! Annotation module
//!
//! Typed W3C annotations as served by AnnoRepo, the line selectors carried by
//! their Text targets, and the store the resolver queries.
//!
//! # Components
//!
//! - `types`: annotations, targets and pages, decoded once from JSON
//! - `selector`: line/character selectors of Text targets
//! - `store`: the [`AnnotationStore`] trait and search paging types
//! - `annorepo`: the HTTP implementation with bounded retry

mod annorepo;
mod selector;
mod store;
mod types;

pub use annorepo::{AnnoRepoClient, RetryPolicy};
pub use selector::Selector;
pub use store::{AnnotationStore, RangeQuery, SearchMode, SearchPage};
pub use types::{
    decode_page, Annotation, AnnotationBody, AnnotationPage, Target, TargetSelector, TargetType,
};

#[cfg(test)]
pub use store::MockStore;
