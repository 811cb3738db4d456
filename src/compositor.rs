//! Document Compositor - place source art into a frame's placeholder
//!
//! One algorithm for every runtime. Parsing and serialization go through
//! [`crate::xml`]; everything between (marker lookup, geometry, group
//! construction, insertion, marker removal) happens on [`Element`] trees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Attribute, Document, Element, Node, NodePath};
use crate::geometry::{resolve_placement, Placement, Size};
use crate::templates::TemplateDescriptor;

/// `id` of the element frame artists use to mark where the barcode goes.
pub const PLACEHOLDER_MARKER_ID: &str = "qr-placeholder";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Malformed source document for template {template_id}: {reason}")]
    MalformedSource { template_id: String, reason: String },

    #[error("Malformed artwork for template {template_id}: {reason}")]
    MalformedTarget { template_id: String, reason: String },

    #[error("Composition failed: {0}")]
    Composition(String),
}

/// Where the source group goes in the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Inside the element at `parent`, before its child `index`
    /// (the marker's next sibling; `index` may equal the child count).
    Before { parent: NodePath, index: usize },
    /// Last child of the target root; used when the artwork has no marker.
    AppendToRoot,
}

impl InsertionPoint {
    /// Resolve against `root`: the marker's slot if present, else the root.
    pub fn locate(root: &Element, marker_id: &str) -> Self {
        match root.find_by_id(marker_id) {
            Some(mut path) => {
                let marker_index = path.pop().unwrap_or_default();
                InsertionPoint::Before {
                    parent: path,
                    index: marker_index + 1,
                }
            }
            None => InsertionPoint::AppendToRoot,
        }
    }

    pub fn has_marker(&self) -> bool {
        matches!(self, InsertionPoint::Before { .. })
    }
}

/// Result of one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedDocument {
    pub markup: String,
    pub placement: Placement,
    /// The source's declared size the placement was computed from.
    pub source_size: Size,
    pub marker_replaced: bool,
}

impl ComposedDocument {
    /// `data:` URI of the composed SVG, for handing to an image element or a
    /// rasterizer.
    pub fn to_data_uri(&self) -> String {
        use base64::Engine as _;
        format!(
            "data:image/svg+xml;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(self.markup.as_bytes())
        )
    }
}

#[derive(Debug, Clone)]
pub struct Compositor {
    marker_id: String,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self::with_marker_id(PLACEHOLDER_MARKER_ID)
    }

    pub fn with_marker_id(marker_id: impl Into<String>) -> Self {
        Self { marker_id: marker_id.into() }
    }

    pub fn marker_id(&self) -> &str {
        &self.marker_id
    }

    /// Parse `source_markup` and compose it into `target_markup`.
    pub fn compose_markup(
        &self,
        source_markup: &str,
        target_markup: &str,
        descriptor: &TemplateDescriptor,
    ) -> Result<ComposedDocument, ComposeError> {
        let source = Document::parse(source_markup).map_err(|e| ComposeError::MalformedSource {
            template_id: descriptor.id.clone(),
            reason: e.to_string(),
        })?;
        self.compose(&source, target_markup, descriptor)
    }

    pub fn compose(
        &self,
        source: &Document,
        target_markup: &str,
        descriptor: &TemplateDescriptor,
    ) -> Result<ComposedDocument, ComposeError> {
        let malformed_target = |reason: String| ComposeError::MalformedTarget {
            template_id: descriptor.id.clone(),
            reason,
        };

        let mut target = Document::parse(target_markup).map_err(|e| malformed_target(e.to_string()))?;
        if target.intrinsic_size().is_none() {
            return Err(malformed_target(
                "root element declares neither viewBox nor width/height".to_string(),
            ));
        }

        let source_size = source.intrinsic_size().ok_or_else(|| ComposeError::MalformedSource {
            template_id: descriptor.id.clone(),
            reason: "root element declares neither viewBox nor width/height".to_string(),
        })?;

        let insertion = InsertionPoint::locate(&target.root, &self.marker_id);
        let placement = resolve_placement(&descriptor.placeholder, descriptor.qr_scale, source_size);
        tracing::debug!(
            template = %descriptor.id,
            marker = insertion.has_marker(),
            scale = placement.scale,
            offset_x = placement.offset_x,
            offset_y = placement.offset_y,
            fit = ?placement.fit,
            "placement resolved"
        );

        let group = build_group(source, &target.root, &placement);
        insert_group(&mut target.root, &insertion, group)?;

        let markup = target
            .to_markup()
            .map_err(|e| ComposeError::Composition(e.to_string()))?;

        Ok(ComposedDocument {
            markup,
            placement,
            source_size,
            marker_replaced: insertion.has_marker(),
        })
    }
}

/// `<g transform="translate(..) scale(..)">` holding deep copies of the
/// source root's children.
fn build_group(source: &Document, target_root: &Element, placement: &Placement) -> Element {
    let name = match target_root.prefix() {
        Some(prefix) => format!("{}:g", prefix),
        None => "g".to_string(),
    };
    let mut group = Element::new(name);

    // Re-bind any namespace the copied children rely on that the target root
    // does not bind to the same URI (default namespace, xlink:href ...).
    for decl in &source.root.attributes {
        let is_declaration = decl.name == "xmlns" || decl.name.starts_with("xmlns:");
        if is_declaration && target_root.attr(&decl.name) != Some(decl.value.as_str()) {
            group.attributes.push(decl.clone());
        }
    }

    // A source viewBox that does not start at the origin is shifted back to it.
    let [min_x, min_y] = source
        .root
        .view_box()
        .map_or([0.0, 0.0], |vb| [vb[0], vb[1]]);
    let translate_x = placement.offset_x - min_x * placement.scale;
    let translate_y = placement.offset_y - min_y * placement.scale;

    group.attributes.push(Attribute {
        name: "transform".to_string(),
        value: format!(
            "translate({}, {}) scale({})",
            format_number(translate_x),
            format_number(translate_y),
            format_number(placement.scale)
        ),
    });
    group.children = source.root.children.clone();
    group
}

fn insert_group(
    root: &mut Element,
    insertion: &InsertionPoint,
    group: Element,
) -> Result<(), ComposeError> {
    match insertion {
        InsertionPoint::AppendToRoot => {
            root.children.push(Node::Element(group));
        }
        InsertionPoint::Before { parent, index } => {
            let parent_el = root.element_at_mut(parent).ok_or_else(|| {
                ComposeError::Composition("marker parent vanished from the tree".to_string())
            })?;
            if *index == 0 || *index > parent_el.children.len() {
                return Err(ComposeError::Composition(format!(
                    "insertion index {} out of range",
                    index
                )));
            }
            parent_el.children.insert(*index, Node::Element(group));
            // Marker goes only after the group is in, so `index` stayed valid.
            parent_el.children.remove(index - 1);
        }
    }
    Ok(())
}

/// Shortest decimal text that parses back to exactly `value`. `f64`'s
/// `Display` never switches to exponent notation, so the output is plain SVG
/// number syntax and identical on every platform.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Rect;

    fn descriptor(qr_scale: f64) -> TemplateDescriptor {
        TemplateDescriptor {
            id: "envelope".to_string(),
            name: "Envelope".to_string(),
            category: "mail".to_string(),
            description: String::new(),
            asset_ref: "frames/envelope.svg".to_string(),
            placeholder: Rect::new(100.0, 100.0, 200.0, 200.0),
            qr_size: None,
            qr_scale,
            tags: Default::default(),
        }
    }

    const SOURCE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><rect width="200" height="200" fill="white"/><path d="M0 0h10v10H0z"/></svg>"#;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(105.0), "105");
        assert_eq!(format_number(0.95), "0.95");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-12.5), "-12.5");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_number(2e-9), "0.000000002");
    }

    #[test]
    fn test_format_number_round_trips() {
        for value in [200.0 / 30_000_000.0, 200.0 / 700_000.0, 1.0 / 3e9, 0.1 + 0.2, 123456.789] {
            let text = format_number(value);
            assert!(!text.contains('e'), "{}", text);
            assert_eq!(text.parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn test_written_scale_matches_reported_placement() {
        let source = r#"<svg viewBox="0 0 30000000 30000000"><rect/></svg>"#;
        let composed = Compositor::new()
            .compose_markup(source, r#"<svg viewBox="0 0 400 400"/>"#, &descriptor(1.0))
            .unwrap();
        let p = composed.placement;
        let expected = format!(
            r#"transform="translate({}, {}) scale({})""#,
            format_number(p.offset_x),
            format_number(p.offset_y),
            format_number(p.scale)
        );
        assert_eq!(format_number(p.scale).parse::<f64>().unwrap(), p.scale);
        assert!(composed.markup.contains(&expected), "{}", composed.markup);
        assert!(!composed.markup.contains("scale(0)"));
    }

    #[test]
    fn test_marker_replaced_in_place() {
        let target = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400"><rect id="bg"/><rect id="qr-placeholder" x="100" y="100" width="200" height="200"/><text>Hi</text></svg>"#;
        let composed = Compositor::new()
            .compose_markup(SOURCE, target, &descriptor(0.95))
            .unwrap();

        assert!(composed.marker_replaced);
        assert_eq!(
            composed.markup,
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400"><rect id="bg"/>"#,
                r#"<g transform="translate(105, 105) scale(0.95)"><rect width="200" height="200" fill="white"/><path d="M0 0h10v10H0z"/></g>"#,
                r#"<text>Hi</text></svg>"#
            )
        );
    }

    #[test]
    fn test_marker_as_last_child() {
        let target = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400"><g><circle/><rect id="qr-placeholder"/></g></svg>"#;
        let composed = Compositor::new()
            .compose_markup(SOURCE, target, &descriptor(0.95))
            .unwrap();
        assert!(composed.markup.contains(r#"viewBox="0 0 400 400"><g><circle/><g transform="#));
        assert!(composed.markup.ends_with("</g></g></svg>"));
        assert!(!composed.markup.contains("qr-placeholder"));
    }

    #[test]
    fn test_no_marker_appends_to_root() {
        let target = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400"><rect id="bg"/></svg>"#;
        let composed = Compositor::new()
            .compose_markup(SOURCE, target, &descriptor(0.5))
            .unwrap();
        assert!(!composed.marker_replaced);
        assert!(composed
            .markup
            .contains(r#"viewBox="0 0 400 400"><rect id="bg"/><g transform="translate(150, 150) scale(0.5)">"#));
    }

    #[test]
    fn test_custom_marker_id() {
        let target = r#"<svg width="400" height="400"><rect id="code-slot"/><rect id="qr-placeholder"/></svg>"#;
        let composed = Compositor::with_marker_id("code-slot")
            .compose_markup(SOURCE, target, &descriptor(0.95))
            .unwrap();
        assert!(!composed.markup.contains("code-slot"));
        assert!(composed.markup.contains("qr-placeholder"));
    }

    #[test]
    fn test_source_view_box_origin_compensated() {
        let source = r#"<svg viewBox="-10 -10 200 200"><rect/></svg>"#;
        let target = r#"<svg viewBox="0 0 400 400"/>"#;
        let composed = Compositor::new()
            .compose_markup(source, target, &descriptor(0.5))
            .unwrap();
        // offset 150, minus -10 * 0.5
        assert!(composed.markup.contains(r#"transform="translate(155, 155) scale(0.5)""#));
    }

    #[test]
    fn test_source_namespace_bindings_carried() {
        let source = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="200" height="200"><use xlink:href="#m"/></svg>"##;
        let target = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400"/>"#;
        let composed = Compositor::new()
            .compose_markup(source, target, &descriptor(0.95))
            .unwrap();
        assert!(composed
            .markup
            .contains(r#"<g xmlns:xlink="http://www.w3.org/1999/xlink" transform="#));
        // The result must still parse.
        Document::parse(&composed.markup).unwrap();
    }

    #[test]
    fn test_prefixed_target_gets_prefixed_group() {
        let target = r#"<s:svg xmlns:s="http://www.w3.org/2000/svg" viewBox="0 0 400 400"/>"#;
        let composed = Compositor::new()
            .compose_markup(SOURCE, target, &descriptor(0.95))
            .unwrap();
        assert!(composed
            .markup
            .contains(r#"<s:g xmlns="http://www.w3.org/2000/svg" transform="#));
        assert!(composed.markup.ends_with("</s:g></s:svg>"));
    }

    #[test]
    fn test_target_without_size_rejected() {
        let err = Compositor::new()
            .compose_markup(SOURCE, "<svg><g/></svg>", &descriptor(0.95))
            .unwrap_err();
        assert!(matches!(err, ComposeError::MalformedTarget { ref template_id, .. } if template_id == "envelope"));
    }

    #[test]
    fn test_unparsable_target_rejected() {
        let err = Compositor::new()
            .compose_markup(SOURCE, "<svg viewBox='0 0 1 1'>", &descriptor(0.95))
            .unwrap_err();
        assert!(matches!(err, ComposeError::MalformedTarget { .. }));
    }

    #[test]
    fn test_source_without_size_rejected() {
        let err = Compositor::new()
            .compose_markup("<svg><rect/></svg>", r#"<svg viewBox="0 0 400 400"/>"#, &descriptor(0.95))
            .unwrap_err();
        assert!(matches!(err, ComposeError::MalformedSource { ref template_id, .. } if template_id == "envelope"));
        let err = Compositor::new()
            .compose_markup("<svg", r#"<svg viewBox="0 0 400 400"/>"#, &descriptor(0.95))
            .unwrap_err();
        assert!(matches!(err, ComposeError::MalformedSource { .. }));
        assert!(err.to_string().contains("envelope"));
    }

    #[test]
    fn test_data_uri() {
        let composed = Compositor::new()
            .compose_markup(SOURCE, r#"<svg viewBox="0 0 400 400"/>"#, &descriptor(0.95))
            .unwrap();
        assert!(composed.to_data_uri().starts_with("data:image/svg+xml;base64,PHN2Zy"));
    }

    #[test]
    fn test_locate_insertion_point() {
        let doc = Document::parse(r#"<svg><g/><g><a/><b id="m"/></g></svg>"#).unwrap();
        assert_eq!(
            InsertionPoint::locate(&doc.root, "m"),
            InsertionPoint::Before { parent: vec![1], index: 2 }
        );
        assert_eq!(InsertionPoint::locate(&doc.root, "x"), InsertionPoint::AppendToRoot);
    }
}
