//! Broccoli Server Library
//!
//! Aggregates annotations, text and IIIF details for historical document
//! viewers. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `anno`: typed annotations and the annotation store client
//! - `text`: text markers and the text source client
//! - `resolver`: text anchor resolution and range queries
//! - `routes`: the HTTP surface

pub mod anno;
pub mod config;
pub mod error;
pub mod iiif;
pub mod project;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod text;
