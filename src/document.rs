//! Vector Document Model
//!
//! A minimal owned tree (element, ordered attributes, children). The
//! compositor works only against this model; parsing and serialization live
//! in [`crate::xml`].

use crate::geometry::Size;

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Qualified name as written, e.g. `viewBox`, `xlink:href`, `xmlns:xlink`.
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written, e.g. `svg`, `g`, `svg:rect`.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

/// Position of an element as child indices from the root.
pub type NodePath = Vec<usize>;

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set `name`, replacing in place if present so attribute order is kept.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Namespace prefix of this element's name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Depth-first, document-order search for the first element with `id`.
    /// Returns the child-index path from `self`.
    pub fn find_by_id(&self, id: &str) -> Option<NodePath> {
        for (index, node) in self.children.iter().enumerate() {
            if let Node::Element(child) = node {
                if child.attr("id") == Some(id) {
                    return Some(vec![index]);
                }
                if let Some(mut rest) = child.find_by_id(id) {
                    rest.insert(0, index);
                    return Some(rest);
                }
            }
        }
        None
    }

    /// Element reached by following `path` from `self`. An empty path is `self`.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self.children.get_mut(first)? {
            Node::Element(child) => child.element_at_mut(rest),
            _ => None,
        }
    }

    /// Size declared on this element: `viewBox` width/height first, then
    /// `width`/`height`. `None` when neither yields positive finite numbers.
    pub fn declared_size(&self) -> Option<Size> {
        if let Some(view_box) = self.view_box() {
            return Some(Size::new(view_box[2], view_box[3]));
        }
        let width = parse_length(self.attr("width")?)?;
        let height = parse_length(self.attr("height")?)?;
        Some(Size::new(width, height))
    }

    /// `[min_x, min_y, width, height]` when a usable `viewBox` is present.
    pub fn view_box(&self) -> Option<[f64; 4]> {
        let raw = self.attr("viewBox")?;
        let parts: Vec<f64> = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::parse::<f64>)
            .collect::<Result<_, _>>()
            .ok()?;
        let [min_x, min_y, width, height] = <[f64; 4]>::try_from(parts).ok()?;
        let usable = [min_x, min_y].iter().all(|v| v.is_finite())
            && width.is_finite()
            && height.is_finite()
            && width > 0.0
            && height > 0.0;
        usable.then_some([min_x, min_y, width, height])
    }
}

/// Parse an SVG length in user units. Accepts a bare number or a `px`
/// suffix; other units and percentages cannot be resolved without a viewport.
fn parse_length(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim_end();
    let value: f64 = number.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// A parsed vector document with exactly one root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse markup with the crate's XML adapter.
    pub fn parse(markup: &str) -> Result<Self, crate::xml::XmlError> {
        crate::xml::parse(markup)
    }

    pub fn to_markup(&self) -> Result<String, crate::xml::XmlError> {
        crate::xml::serialize(self)
    }

    pub fn intrinsic_size(&self) -> Option<Size> {
        self.root.declared_size()
    }
}
