//! Element tree – the abstract, serializable representation of a rendered
//! document.
//!
//! Views (static or compiled) produce this tree; the renderer serializes it
//! to HTML. Attributes keep insertion order so serialization is
//! deterministic.

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Node(ElementNode),
    Text(String),
}

/// An element carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub attrs: Vec<(String, AttrValue)>,
    pub children: Vec<Element>,
}

/// An attribute value.
///
/// `Style` holds camelCased property names as authored; the renderer
/// kebab-cases them. `RawHtml` is the one escaping bypass: it replaces the
/// node's content verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Style(Vec<(String, String)>),
    RawHtml(String),
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), AttrValue::Text(value.into())));
        self
    }

    /// Shorthand for the framework's class-name alias.
    pub fn class(self, classes: impl Into<String>) -> Self {
        self.attr("className", classes)
    }

    pub fn style(mut self, pairs: &[(&str, &str)]) -> Self {
        let pairs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.attrs.push(("style".to_string(), AttrValue::Style(pairs)));
        self
    }

    /// Inject pre-built markup as this node's content, bypassing escaping.
    pub fn raw_html(mut self, html: impl Into<String>) -> Self {
        self.attrs.push((
            "dangerouslySetInnerHTML".to_string(),
            AttrValue::RawHtml(html.into()),
        ));
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Element::Text(text.into()));
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl From<ElementNode> for Element {
    fn from(node: ElementNode) -> Self {
        Element::Node(node)
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::Text(text.to_string())
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Text(text)
    }
}

/// HTML void elements: serialized without children or a closing tag.
pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Format a number the way template output expects: integral values without
/// a trailing `.0`.
pub(crate) fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
