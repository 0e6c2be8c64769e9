//! Annotation types as served by the annotation store
//!
//! Payloads follow the W3C Web Annotation Data Model as used by AnnoRepo.
//! They are decoded once into these typed structures; Text selectors are
//! parsed into [`Selector`] while other selectors are carried verbatim.
//!
//! Reference: <https://www.w3.org/TR/annotation-model/>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::selector::Selector;
use crate::error::ResolveError;

/// A single annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub id: String,
    pub body: AnnotationBody,
    #[serde(rename = "target")]
    pub targets: Vec<Target>,
}

/// The semantic subject of an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBody {
    #[serde(rename = "type")]
    pub body_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// What kind of resource a target points to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetType {
    Text,
    Canvas,
    Image,
    Other(String),
}

impl From<String> for TargetType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Text" => Self::Text,
            "Canvas" => Self::Canvas,
            "Image" => Self::Image,
            _ => Self::Other(s),
        }
    }
}

impl From<TargetType> for String {
    fn from(t: TargetType) -> Self {
        match t {
            TargetType::Text => "Text".to_string(),
            TargetType::Canvas => "Canvas".to_string(),
            TargetType::Image => "Image".to_string(),
            TargetType::Other(s) => s,
        }
    }
}

/// A pointer from an annotation to a source resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<TargetSelector>,
}

/// Selector attached to a target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetSelector {
    /// Line/character selector of a Text target
    Text(Selector),
    /// Any other selector (image regions, fragments), kept as received
    Opaque(Value),
}

impl Target {
    /// The line selector, if this is a Text target carrying one
    pub fn text_selector(&self) -> Option<&Selector> {
        match &self.selector {
            Some(TargetSelector::Text(selector)) => Some(selector),
            _ => None,
        }
    }
}

impl Annotation {
    pub fn body_type(&self) -> &str {
        &self.body.body_type
    }

    /// The body id, falling back to the annotation id
    pub fn body_id(&self) -> &str {
        self.body.id.as_deref().unwrap_or(&self.id)
    }

    /// The first Text target with a selector on `source`
    pub fn text_anchor_on(&self, source: &str) -> Option<&Selector> {
        self.targets
            .iter()
            .filter(|t| t.target_type == TargetType::Text && t.source == source)
            .find_map(Target::text_selector)
    }
}

/// An ordered page of annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotationPage {
    pub items: Vec<Annotation>,
}

impl AnnotationPage {
    pub fn new(items: Vec<Annotation>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Annotation] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All targets of the given type, in item order
    pub fn targets<'a>(&'a self, target_type: &'a TargetType) -> impl Iterator<Item = &'a Target> {
        self.items
            .iter()
            .flat_map(|a| a.targets.iter())
            .filter(move |t| &t.target_type == target_type)
    }

    /// Targets of the given type that carry a selector
    pub fn with_selector<'a>(&'a self, target_type: &'a TargetType) -> Vec<&'a Target> {
        self.targets(target_type)
            .filter(|t| t.selector.is_some())
            .collect()
    }

    /// Targets of the given type without a selector
    pub fn without_selector<'a>(&'a self, target_type: &'a TargetType) -> Vec<&'a Target> {
        self.targets(target_type)
            .filter(|t| t.selector.is_none())
            .collect()
    }

    /// The `source` of every target of the given type
    pub fn target_sources(&self, target_type: &TargetType) -> Vec<String> {
        self.targets(target_type).map(|t| t.source.clone()).collect()
    }
}

// Wire format

#[derive(Deserialize)]
struct WirePage {
    #[serde(default)]
    items: Vec<WireAnnotation>,
}

#[derive(Deserialize)]
struct WireAnnotation {
    id: String,
    body: AnnotationBody,
    #[serde(default)]
    target: OneOrMany,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<WireTarget>),
    One(WireTarget),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Deserialize)]
struct WireTarget {
    #[serde(rename = "type")]
    target_type: TargetType,
    source: String,
    #[serde(default)]
    selector: Option<Value>,
}

impl From<WireTarget> for Target {
    fn from(wire: WireTarget) -> Self {
        let selector = match wire.selector {
            None | Some(Value::Null) => None,
            Some(raw) if wire.target_type == TargetType::Text => match Selector::parse(&raw) {
                Ok(selector) => Some(TargetSelector::Text(selector)),
                Err(e) => {
                    // Not a line selector; only the anchor lookup needs one
                    tracing::debug!("keeping Text selector on {} verbatim: {}", wire.source, e);
                    Some(TargetSelector::Opaque(raw))
                }
            },
            Some(raw) => Some(TargetSelector::Opaque(raw)),
        };

        Target {
            target_type: wire.target_type,
            source: wire.source,
            selector,
        }
    }
}

impl From<WireAnnotation> for Annotation {
    fn from(wire: WireAnnotation) -> Self {
        let targets = match wire.target {
            OneOrMany::Many(targets) => targets,
            OneOrMany::One(target) => vec![target],
        };

        Annotation {
            id: wire.id,
            body: wire.body,
            targets: targets.into_iter().map(Target::from).collect(),
        }
    }
}

/// Decode an AnnotationPage document (`{"items": [...]}`)
pub fn decode_page(bytes: &[u8]) -> Result<AnnotationPage, ResolveError> {
    let wire: WirePage = serde_json::from_slice(bytes)?;
    Ok(AnnotationPage {
        items: wire.items.into_iter().map(Annotation::from).collect(),
    })
}
