//! Markup adapter - the only code that knows which XML libraries are in use.
//!
//! `roxmltree` parses; `quick-xml` writes. `roxmltree` resolves namespaces
//! and drops the raw `xmlns` attributes, so parsing keeps each name exactly
//! as it was written and re-emits each namespace declaration on the element
//! that introduced it. The XML declaration and DOCTYPE are not carried
//! through.

use std::borrow::Cow;
use std::ops::Range;

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use thiserror::Error;

use crate::document::{Attribute, Document, Element, Node};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Invalid markup: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("Failed to write markup: {0}")]
    Write(String),

    #[error("Written markup is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

pub fn parse(markup: &str) -> Result<Document, XmlError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let parsed = roxmltree::Document::parse_with_options(markup, options)?;
    Ok(Document::new(convert_element(markup, parsed.root_element())))
}

fn convert_element(markup: &str, node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let name = written_element_name(markup, node.range())
        .map(str::to_string)
        .unwrap_or_else(|| qualified_name(node, tag.namespace(), tag.name()));
    let mut element = Element::new(name);

    element.attributes.extend(namespace_declarations(node));
    element.attributes.extend(node.attributes().map(|attr| Attribute {
        name: markup
            .get(attr.range_qname())
            .map(str::to_string)
            .unwrap_or_else(|| qualified_name(node, attr.namespace(), attr.name())),
        value: attr.value().to_string(),
    }));

    for child in node.children() {
        let converted = match child.node_type() {
            roxmltree::NodeType::Element => Node::Element(convert_element(markup, child)),
            roxmltree::NodeType::Text => Node::Text(child.text().unwrap_or_default().to_string()),
            roxmltree::NodeType::Comment => {
                Node::Comment(child.text().unwrap_or_default().to_string())
            }
            roxmltree::NodeType::PI => match child.pi() {
                Some(pi) => Node::ProcessingInstruction {
                    target: pi.target.to_string(),
                    value: pi.value.map(str::to_string),
                },
                None => continue,
            },
            roxmltree::NodeType::Root => continue,
        };
        element.children.push(converted);
    }

    element
}

/// Tag name as it appears in the start tag spanning `range`.
fn written_element_name(markup: &str, range: Range<usize>) -> Option<&str> {
    let tag = markup.get(range)?.strip_prefix('<')?;
    let end = tag.find(|c: char| c.is_whitespace() || c == '/' || c == '>')?;
    (end > 0).then(|| &tag[..end])
}

/// Rebuild a name from its resolved namespace. Only used when the source
/// text is unavailable; prefers a named prefix so attributes keep theirs.
fn qualified_name(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    let prefix = match namespace {
        Some(XML_NAMESPACE) => Some("xml"),
        Some(uri) if node.lookup_namespace_uri(None) == Some(uri) => None,
        Some(uri) => node.lookup_prefix(uri),
        None => None,
    };
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Bindings in scope on `node` that its parent element did not already have.
fn namespace_declarations(node: roxmltree::Node<'_, '_>) -> Vec<Attribute> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| Attribute {
            name: match ns.name() {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            },
            value: ns.uri().to_string(),
        })
        .collect()
}

pub fn serialize(document: &Document) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, &document.root)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for attr in &element.attributes {
        start.push_attribute(XmlAttribute {
            key: QName(attr.name.as_bytes()),
            value: Cow::Owned(escape_attribute(&attr.value).into_bytes()),
        });
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }
    write_event(writer, Event::Start(start))?;

    for child in &element.children {
        match child {
            Node::Element(el) => write_element(writer, el)?,
            Node::Text(text) => {
                write_event(writer, Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))))?
            }
            Node::Comment(text) => {
                write_event(writer, Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
            Node::ProcessingInstruction { target, value } => {
                let content = match value {
                    Some(value) => format!("{} {}", target, value),
                    None => target.clone(),
                };
                write_event(writer, Event::PI(BytesPI::new(content)))?
            }
        }
    }

    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

/// Markup escaping plus character references for whitespace that attribute
/// value normalization would otherwise fold into spaces.
fn escape_attribute(raw: &str) -> String {
    let escaped = escape(raw);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped.into_owned();
    }
    escaped
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_structure() {
        let markup = concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 50" class="frame">"##,
            "\n  <!-- border -->\n",
            r##"  <rect x="0" y="0" width="100" height="50" fill="#fff"/>"##,
            "\n  <text x=\"5\" y=\"20\">Scan &amp; go</text>\n",
            "</svg>"
        );
        let doc = parse(markup).unwrap();
        assert_eq!(serialize(&doc).unwrap(), markup);
    }

    #[test]
    fn test_prefixed_attributes_keep_prefix() {
        let markup = concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
            r##"<use xlink:href="#a" xml:space="preserve"/>"##,
            "</svg>"
        );
        let doc = parse(markup).unwrap();
        let out = serialize(&doc).unwrap();
        assert!(out.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#));
        assert!(out.contains(r##"<use xlink:href="#a" xml:space="preserve"/>"##));
        assert!(!out.contains("xmlns:xml="));
    }

    #[test]
    fn test_namespace_declared_once() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect/></g></svg>"#;
        let out = serialize(&parse(markup).unwrap()).unwrap();
        assert_eq!(out.matches("xmlns=").count(), 1);
        assert_eq!(out, markup);
    }

    #[test]
    fn test_prefixed_root_element() {
        let markup = r#"<s:svg xmlns:s="http://www.w3.org/2000/svg" width="10" height="10"><s:rect/></s:svg>"#;
        let doc = parse(markup).unwrap();
        assert_eq!(doc.root.name, "s:svg");
        assert_eq!(serialize(&doc).unwrap(), markup);
    }

    #[test]
    fn test_doctype_and_declaration_accepted() {
        let markup = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" ",
            "\"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n",
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#
        );
        let doc = parse(markup).unwrap();
        assert_eq!(
            serialize(&doc).unwrap(),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#
        );
    }

    #[test]
    fn test_prefixed_declaration_before_default_keeps_unprefixed_names() {
        let markup = concat!(
            r#"<svg xmlns:svg="http://www.w3.org/2000/svg" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 400">"#,
            r#"<rect id="bg"/><svg:circle r="4"/><g><text>Hi</text></g>"#,
            "</svg>"
        );
        let doc = parse(markup).unwrap();
        assert_eq!(doc.root.name, "svg");
        let names: Vec<_> = doc.root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["rect", "svg:circle", "g"]);

        let out = serialize(&doc).unwrap();
        assert!(out.starts_with("<svg "), "{}", out);
        assert!(out.contains(r#"<rect id="bg"/><svg:circle r="4"/><g><text>Hi</text></g>"#), "{}", out);
        assert!(out.ends_with("</svg>"));
        assert!(out.contains(r#"xmlns:svg="http://www.w3.org/2000/svg""#));
        assert!(out.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert_eq!(parse(&out).unwrap(), doc);
    }

    #[test]
    fn test_attribute_whitespace_survives() {
        let markup = "<svg data-lines=\"a&#10;b&#9;c\"/>";
        let doc = parse(markup).unwrap();
        assert_eq!(doc.root.attr("data-lines"), Some("a\nb\tc"));
        assert_eq!(serialize(&doc).unwrap(), markup);
    }

    #[test]
    fn test_attribute_values_escaped() {
        let markup = r#"<svg data-note="a &lt; b &amp; &quot;c&quot;"/>"#;
        assert_eq!(serialize(&parse(markup).unwrap()).unwrap(), markup);
    }

    #[test]
    fn test_processing_instruction_kept() {
        let markup = r#"<svg><?render hint?><g/></svg>"#;
        assert_eq!(serialize(&parse(markup).unwrap()).unwrap(), markup);
    }

    #[test]
    fn test_malformed_markup_rejected() {
        assert!(parse("<svg><g></svg>").is_err());
        assert!(parse("not markup at all").is_err());
        assert!(parse("").is_err());
    }
}
