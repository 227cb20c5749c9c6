//! View renderer – invokes a view with props and serializes the resulting
//! element tree to an HTML fragment.
//!
//! Serialization rules:
//! - text children are escaped against HTML injection by default;
//! - `dangerouslySetInnerHTML` is the one explicit, opt-in bypass; it
//!   replaces the node's content verbatim;
//! - `style` objects become kebab-cased inline `style="…"` strings;
//! - `className` is renamed to the literal `class`;
//! - void elements are serialized without children or a closing tag.
//!
//! Rendering is a pure function of `(view, props)`.

use serde_json::Value as Json;

use crate::ast::CompiledTemplate;
use crate::element::{fmt_number, is_void, AttrValue, Element};
use crate::error::RenderError;
use crate::eval;

/// A view: a pure function from props to an element tree.
///
/// Static views are authored in Rust and constructed once at process start;
/// dynamic views are compiled from source per request and discarded after
/// rendering.
pub enum View {
    Static(fn(&Json) -> Result<Element, RenderError>),
    Dynamic(CompiledTemplate),
}

impl View {
    pub fn invoke(&self, props: &Json) -> Result<Element, RenderError> {
        match self {
            View::Static(f) => f(props),
            View::Dynamic(template) => eval::evaluate(template, props),
        }
    }
}

/// Render a view with the given props to an HTML fragment.
pub fn render_fragment(view: &View, props: &Json) -> Result<String, RenderError> {
    let root = view.invoke(props)?;
    let mut out = String::with_capacity(1024);
    write_element(&root, &mut out);
    Ok(out)
}

/// Serialize an element tree to HTML, appending to `out`.
pub fn write_element(element: &Element, out: &mut String) {
    match element {
        Element::Text(text) => push_escaped_text(out, text),
        Element::Node(node) => {
            out.push('<');
            out.push_str(&node.tag);

            let mut raw_content: Option<&str> = None;
            for (name, value) in &node.attrs {
                match value {
                    AttrValue::RawHtml(html) => raw_content = Some(html),
                    AttrValue::Style(pairs) => {
                        out.push_str(" style=\"");
                        for (prop, v) in pairs {
                            push_kebab_case(out, prop);
                            out.push(':');
                            push_escaped_attr(out, v);
                            out.push(';');
                        }
                        out.push('"');
                    }
                    AttrValue::Text(v) => {
                        out.push(' ');
                        out.push_str(attr_name(name));
                        out.push_str("=\"");
                        push_escaped_attr(out, v);
                        out.push('"');
                    }
                    AttrValue::Number(n) => {
                        out.push(' ');
                        out.push_str(attr_name(name));
                        out.push_str("=\"");
                        out.push_str(&fmt_number(*n));
                        out.push('"');
                    }
                    AttrValue::Bool(true) => {
                        out.push(' ');
                        out.push_str(attr_name(name));
                    }
                    AttrValue::Bool(false) => {}
                }
            }

            out.push('>');
            if is_void(&node.tag) {
                return;
            }

            match raw_content {
                // The opt-in injection point: content goes through verbatim.
                Some(html) => out.push_str(html),
                None => {
                    for child in &node.children {
                        write_element(child, out);
                    }
                }
            }

            out.push_str("</");
            out.push_str(&node.tag);
            out.push('>');
        }
    }
}

fn attr_name(name: &str) -> &str {
    if name == "className" {
        "class"
    } else {
        name
    }
}

fn push_kebab_case(out: &mut String, prop: &str) {
    for c in prop.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
}

fn push_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
}

/// Escape text for interpolation into HTML content (used by the assembler
/// for titles).
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped_text(&mut out, text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementNode;

    fn html_of(element: Element) -> String {
        let mut out = String::new();
        write_element(&element, &mut out);
        out
    }

    #[test]
    fn text_is_escaped_by_default() {
        let el = ElementNode::new("div")
            .text("<script>alert('x')</script> & more")
            .into();
        assert_eq!(
            html_of(el),
            "<div>&lt;script&gt;alert('x')&lt;/script&gt; &amp; more</div>"
        );
    }

    #[test]
    fn raw_html_bypasses_escaping() {
        let el = ElementNode::new("div").raw_html("<b>x</b>").into();
        assert_eq!(html_of(el), "<div><b>x</b></div>");
    }

    #[test]
    fn class_name_alias_is_renamed() {
        let el = ElementNode::new("p").class("mb-4 font-bold").into();
        assert_eq!(html_of(el), "<p class=\"mb-4 font-bold\"></p>");
    }

    #[test]
    fn style_objects_are_kebab_cased() {
        let el = ElementNode::new("div")
            .style(&[("backgroundColor", "#fff"), ("fontSize", "12px")])
            .into();
        assert_eq!(
            html_of(el),
            "<div style=\"background-color:#fff;font-size:12px;\"></div>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let el = ElementNode::new("img").attr("src", "logo.png").into();
        assert_eq!(html_of(el), "<img src=\"logo.png\">");
    }

    #[test]
    fn attribute_values_are_escaped() {
        let el = ElementNode::new("div").attr("title", "a\"b<c").into();
        assert_eq!(html_of(el), "<div title=\"a&quot;b&lt;c\"></div>");
    }

    #[test]
    fn boolean_attributes_render_bare_or_not_at_all() {
        let mut node = ElementNode::new("input");
        node.attrs
            .push(("disabled".to_string(), AttrValue::Bool(true)));
        node.attrs
            .push(("checked".to_string(), AttrValue::Bool(false)));
        assert_eq!(html_of(node.into()), "<input disabled>");
    }

    #[test]
    fn rendering_is_deterministic() {
        let view = View::Dynamic(
            crate::compiler::compile(
                "function Template(props) {
                    return <div className=\"p-4\">{props.items.map((i) => <p>{i}</p>)}</div>;
                }",
            )
            .unwrap(),
        );
        let props = serde_json::json!({"items": ["x", "y"]});
        let first = render_fragment(&view, &props).unwrap();
        let second = render_fragment(&view, &props).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "<div class=\"p-4\"><p>x</p><p>y</p></div>");
    }
}
