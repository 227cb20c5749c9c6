//! Fixed document templates – the invoice and report views with fixed prop
//! contracts.
//!
//! These are authored in Rust, constructed once, and reused across
//! requests. Required-field validation runs before a view is invoked; a
//! view failure after validation therefore propagates loudly instead of
//! degrading to a diagnostic document.

use serde_json::{json, Value as Json};

use crate::element::{Element, ElementNode};
use crate::error::{RenderError, ValidationError};
use crate::render::View;

/// Tax applied to the invoice subtotal.
pub const TAX_RATE: f64 = 0.10;

/// Look up a fixed template by its wire name.
pub fn view_for(template_type: &str) -> Option<View> {
    match template_type {
        "invoice" => Some(View::Static(invoice_view)),
        "report" => Some(View::Static(report_view)),
        _ => None,
    }
}

pub fn required_fields(template_type: &str) -> &'static [&'static str] {
    match template_type {
        "invoice" => &["invoiceNumber", "from", "to", "items"],
        "report" => &["title", "sections"],
        _ => &[],
    }
}

/// Reject payloads missing any required field before the view runs.
pub fn validate_props(template_type: &str, props: &Json) -> Result<(), ValidationError> {
    let missing: Vec<&str> = required_fields(template_type)
        .iter()
        .copied()
        .filter(|field| props.get(field).map_or(true, Json::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing.join(", ")))
    }
}

// ---------------------------------------------------------------------------
// Invoice
// ---------------------------------------------------------------------------

/// Invoice with addressed parties, line items, and a 10% tax summary.
pub fn invoice_view(props: &Json) -> Result<Element, RenderError> {
    let number = str_field(props, "invoiceNumber")?;
    let items = array_field(props, "items")?;

    let mut rows: Vec<Element> = vec![ElementNode::new("tr")
        .child(th("Description", "text-left"))
        .child(th("Qty", "text-right"))
        .child(th("Unit Price", "text-right"))
        .child(th("Amount", "text-right"))
        .into()];

    let mut subtotal = 0.0;
    for (i, item) in items.iter().enumerate() {
        let description = item
            .get("description")
            .and_then(Json::as_str)
            .ok_or_else(|| {
                RenderError::Props(format!("item {i}: `description` must be a string"))
            })?;
        let quantity = num_item_field(item, i, "quantity")?;
        let unit_price = num_item_field(item, i, "unitPrice")?;
        let amount = quantity * unit_price;
        subtotal += amount;

        rows.push(
            ElementNode::new("tr")
                .child(td(description, "p-2 border-b"))
                .child(td(&money_plain(quantity), "p-2 border-b text-right"))
                .child(td(&money(unit_price), "p-2 border-b text-right"))
                .child(td(&money(amount), "p-2 border-b text-right"))
                .into(),
        );
    }
    let tax = subtotal * TAX_RATE;
    let total = subtotal + tax;

    let mut root = ElementNode::new("div")
        .class("p-6")
        .child(
            ElementNode::new("div")
                .class("flex justify-between mb-6")
                .child(
                    ElementNode::new("h1")
                        .class("text-3xl font-bold")
                        .text(format!("Invoice #{number}")),
                )
                .child(
                    ElementNode::new("p")
                        .class("text-gray-500")
                        .text(props.get("date").and_then(Json::as_str).unwrap_or("")),
                ),
        )
        .child(
            ElementNode::new("div")
                .class("flex justify-between mb-6")
                .child(party_block("From:", props.get("from")))
                .child(party_block("To:", props.get("to"))),
        )
        .child(
            ElementNode::new("table")
                .class("w-full mb-6")
                .children(rows),
        )
        .child(
            ElementNode::new("div")
                .class("text-right")
                .child(summary_line("Subtotal", &money(subtotal), ""))
                .child(summary_line("Tax (10%)", &money(tax), ""))
                .child(summary_line("Total", &money(total), "text-xl font-bold mt-2")),
        );

    if let Some(notes) = props.get("notes").and_then(Json::as_str) {
        root = root.child(
            ElementNode::new("p")
                .class("text-sm text-gray-500 mt-6")
                .text(notes),
        );
    }

    Ok(root.into())
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Sectioned report with an optional summary and bullet lists.
///
/// When the payload omits `date`, the current wall-clock date is used:
/// the one sanctioned source of run-to-run variation in rendering.
pub fn report_view(props: &Json) -> Result<Element, RenderError> {
    let title = str_field(props, "title")?;
    let sections = array_field(props, "sections")?;

    let date = props
        .get("date")
        .and_then(Json::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| chrono::Local::now().format("%B %d, %Y").to_string());

    let mut root = ElementNode::new("div")
        .class("p-6")
        .child(
            ElementNode::new("h1")
                .class("text-3xl font-bold mb-2")
                .text(title),
        )
        .child(
            ElementNode::new("p")
                .class("text-gray-500 mb-6")
                .text(match props.get("author").and_then(Json::as_str) {
                    Some(author) => format!("{date} — {author}"),
                    None => date,
                }),
        );

    if let Some(summary) = props.get("summary").and_then(Json::as_str) {
        root = root.child(
            ElementNode::new("p")
                .class("mb-6 italic text-gray-700")
                .text(summary),
        );
    }

    for (i, section) in sections.iter().enumerate() {
        let heading = section
            .get("heading")
            .and_then(Json::as_str)
            .ok_or_else(|| {
                RenderError::Props(format!("section {i}: `heading` must be a string"))
            })?;
        root = root.child(
            ElementNode::new("h2")
                .class("text-2xl font-bold mb-2")
                .text(heading),
        );
        if let Some(body) = section.get("body").and_then(Json::as_str) {
            root = root.child(ElementNode::new("p").class("mb-4").text(body));
        }
        if let Some(bullets) = section.get("items").and_then(Json::as_array) {
            let mut list = ElementNode::new("ul").class("mb-4 ml-4");
            for bullet in bullets {
                list = list.child(
                    ElementNode::new("li").text(bullet.as_str().unwrap_or_default()),
                );
            }
            root = root.child(list);
        }
    }

    Ok(root.into())
}

// ---------------------------------------------------------------------------
// Prop-schema catalog (served by GET /api/pdf/components)
// ---------------------------------------------------------------------------

pub fn component_catalog() -> Json {
    json!({
        "templates": [
            {
                "name": "invoice",
                "endpoint": "/api/pdf/invoice",
                "requiredProps": required_fields("invoice"),
                "props": {
                    "invoiceNumber": "string",
                    "date": "string (optional)",
                    "from": "{ name: string, address?: string } | string",
                    "to": "{ name: string, address?: string } | string",
                    "items": "[{ description: string, quantity: number, unitPrice: number }]",
                    "notes": "string (optional)"
                }
            },
            {
                "name": "report",
                "endpoint": "/api/pdf/report",
                "requiredProps": required_fields("report"),
                "props": {
                    "title": "string",
                    "author": "string (optional)",
                    "date": "string (optional, defaults to today)",
                    "summary": "string (optional)",
                    "sections": "[{ heading: string, body?: string, items?: [string] }]"
                }
            }
        ]
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn str_field<'a>(props: &'a Json, name: &str) -> Result<&'a str, RenderError> {
    props
        .get(name)
        .and_then(Json::as_str)
        .ok_or_else(|| RenderError::Props(format!("`{name}` must be a string")))
}

fn array_field<'a>(props: &'a Json, name: &str) -> Result<&'a Vec<Json>, RenderError> {
    props
        .get(name)
        .and_then(Json::as_array)
        .ok_or_else(|| RenderError::Props(format!("`{name}` must be an array")))
}

fn num_item_field(item: &Json, index: usize, name: &str) -> Result<f64, RenderError> {
    item.get(name)
        .and_then(Json::as_f64)
        .ok_or_else(|| RenderError::Props(format!("item {index}: `{name}` must be a number")))
}

fn money(value: f64) -> String {
    format!("${value:.2}")
}

fn money_plain(value: f64) -> String {
    crate::element::fmt_number(value)
}

fn th(text: &str, extra: &str) -> Element {
    ElementNode::new("th")
        .class(format!("p-2 bg-gray-200 {extra}"))
        .text(text)
        .into()
}

fn td(text: &str, classes: &str) -> Element {
    ElementNode::new("td").class(classes).text(text).into()
}

fn summary_line(label: &str, amount: &str, extra: &str) -> Element {
    ElementNode::new("p")
        .class(if extra.is_empty() {
            "mb-1".to_string()
        } else {
            format!("mb-1 {extra}")
        })
        .text(format!("{label}: {amount}"))
        .into()
}

/// `from`/`to` accept either a bare string or `{ name, address? }`.
fn party_block(label: &str, value: Option<&Json>) -> Element {
    let mut block = ElementNode::new("div").child(
        ElementNode::new("p").class("font-bold").text(label),
    );
    match value {
        Some(Json::String(name)) => {
            block = block.child(ElementNode::new("p").text(name));
        }
        Some(Json::Object(party)) => {
            if let Some(name) = party.get("name").and_then(Json::as_str) {
                block = block.child(ElementNode::new("p").text(name));
            }
            if let Some(address) = party.get("address").and_then(Json::as_str) {
                block = block.child(
                    ElementNode::new("p").class("text-gray-500").text(address),
                );
            }
        }
        _ => {}
    }
    block.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render_fragment, View};

    fn invoice_props() -> Json {
        json!({
            "invoiceNumber": "2026-001",
            "from": { "name": "Acme Corp", "address": "123 Business St" },
            "to": "Client Inc",
            "items": [
                { "description": "A", "quantity": 2, "unitPrice": 10 },
                { "description": "B", "quantity": 1, "unitPrice": 5 }
            ]
        })
    }

    #[test]
    fn invoice_totals_are_computed_and_formatted() {
        let html =
            render_fragment(&View::Static(invoice_view), &invoice_props()).unwrap();
        assert!(html.contains("Invoice #2026-001"));
        assert!(html.contains("Subtotal: $25.00"));
        assert!(html.contains("Tax (10%): $2.50"));
        assert!(html.contains("Total: $27.50"));
    }

    #[test]
    fn invoice_renders_both_parties() {
        let html =
            render_fragment(&View::Static(invoice_view), &invoice_props()).unwrap();
        assert!(html.contains("Acme Corp"));
        assert!(html.contains("123 Business St"));
        assert!(html.contains("Client Inc"));
    }

    #[test]
    fn invoice_bad_item_shape_fails_loudly() {
        let mut props = invoice_props();
        props["items"][0]["quantity"] = json!("two");
        let err = render_fragment(&View::Static(invoice_view), &props).unwrap_err();
        assert!(matches!(err, RenderError::Props(_)));
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn report_renders_sections_and_bullets() {
        let props = json!({
            "title": "Quarterly Report",
            "date": "February 1, 2026",
            "sections": [
                { "heading": "Summary", "body": "Revenue grew." },
                { "heading": "Highlights", "items": ["CAC down 15%", "NPS at 72"] }
            ]
        });
        let html = render_fragment(&View::Static(report_view), &props).unwrap();
        assert!(html.contains("Quarterly Report"));
        assert!(html.contains("February 1, 2026"));
        assert!(html.contains("<h2 class=\"text-2xl font-bold mb-2\">Highlights</h2>"));
        assert!(html.contains("<li>NPS at 72</li>"));
    }

    #[test]
    fn validation_lists_every_missing_field() {
        let err = validate_props("invoice", &json!({"from": "x"})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields("invoiceNumber, to, items".to_string())
        );
        assert!(validate_props("invoice", &invoice_props()).is_ok());
    }

    #[test]
    fn unknown_template_has_no_view() {
        assert!(view_for("invoice").is_some());
        assert!(view_for("report").is_some());
        assert!(view_for("receipt").is_none());
    }

    #[test]
    fn catalog_documents_both_templates() {
        let catalog = component_catalog();
        let templates = catalog["templates"].as_array().unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0]["name"], "invoice");
        assert_eq!(templates[1]["name"], "report");
    }
}
