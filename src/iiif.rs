//! IIIF context for viewers
//!
//! Pairs a manifest URL with the canvases an annotation targets.

use serde::Serialize;

use crate::anno::{AnnotationPage, TargetType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IiifContext {
    pub manifest: Option<String>,
    pub canvas_ids: Vec<String>,
}

impl IiifContext {
    /// Build the context for an annotation page
    pub fn for_page(manifest_template: Option<&str>, body_id: &str, page: &AnnotationPage) -> Self {
        Self {
            manifest: manifest_template.map(|t| manifest_url(t, body_id)),
            canvas_ids: page.target_sources(&TargetType::Canvas),
        }
    }
}

/// Fill `{bodyId}` in a manifest URL template
pub fn manifest_url(template: &str, body_id: &str) -> String {
    template.replace("{bodyId}", &urlencoding::encode(body_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anno::{Annotation, AnnotationBody, Target};

    fn page() -> AnnotationPage {
        let target = |target_type, source: &str| Target {
            target_type,
            source: source.to_string(),
            selector: None,
        };
        AnnotationPage::new(vec![Annotation {
            id: "a1".to_string(),
            body: AnnotationBody {
                body_type: "Scan".to_string(),
                value: None,
                id: Some("urn:republic:NL-HaNA_1.01.02_3783_0285".to_string()),
            },
            targets: vec![
                target(TargetType::Text, "https://textrepo.example/segments"),
                target(TargetType::Canvas, "https://iiif.example/canvas/0285"),
                target(TargetType::Canvas, "https://iiif.example/canvas/0286"),
            ],
        }])
    }

    #[test]
    fn test_canvas_ids_from_canvas_targets() {
        let context = IiifContext::for_page(None, "urn:x", &page());
        assert_eq!(
            context.canvas_ids,
            vec![
                "https://iiif.example/canvas/0285".to_string(),
                "https://iiif.example/canvas/0286".to_string()
            ]
        );
        assert!(context.manifest.is_none());
    }

    #[test]
    fn test_manifest_template_encodes_body_id() {
        assert_eq!(
            manifest_url("https://iiif.example/manifest/{bodyId}", "urn:republic:NL-HaNA_0285"),
            "https://iiif.example/manifest/urn%3Arepublic%3ANL-HaNA_0285"
        );
    }
}
