//! Integration tests for the pdfsmith pipeline.
//!
//! These tests validate:
//! - Dynamic template compilation and rendering end to end (minus Chrome)
//! - Escaping rules and the raw-HTML opt-out
//! - Option merging and defaults
//! - Sandbox containment for untrusted template source
//! - The HTTP surface's validation paths (no engine contact)
//!
//! Tests that need a local Chrome/Chromium install are `#[ignore]`d.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use pdfsmith::assemble::assemble;
use pdfsmith::compiler::compile;
use pdfsmith::engine::EngineConfig;
use pdfsmith::error::{PipelineError, RenderError};
use pdfsmith::options::{MarginOptions, PageSetup, PaperFormat, RenderOptions};
use pdfsmith::pipeline::Pipeline;
use pdfsmith::render::{render_fragment, View};
use pdfsmith::server;
use pdfsmith::style;
use pdfsmith::templates;

// =====================================================================
// Helpers
// =====================================================================

fn render_dynamic_fragment(source: &str, props: Value) -> Result<String, RenderError> {
    let template = compile(source).expect("template should compile");
    render_fragment(&View::Dynamic(template), &props)
}

fn test_router() -> axum::Router {
    server::router(Arc::new(Pipeline::new(EngineConfig::default())))
}

async fn post_json(router: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// =====================================================================
// Dynamic templates: compile + evaluate + serialize
// =====================================================================

#[test]
fn props_bind_into_rendered_html() {
    let html = render_dynamic_fragment(
        "function Template(props) { return <div>{props.title}</div>; }",
        json!({"title": "Hi"}),
    )
    .unwrap();
    assert_eq!(html, "<div>Hi</div>");
}

#[test]
fn metacharacter_text_is_escaped() {
    let html = render_dynamic_fragment(
        "function Template(props) { return <div>{props.s}</div>; }",
        json!({"s": "<img src=x onerror=alert(1)>"}),
    )
    .unwrap();
    assert!(!html.contains("<img"));
    assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
}

#[test]
fn raw_html_attribute_injects_verbatim() {
    let html = render_dynamic_fragment(
        "function Template(props) {
            return <div dangerouslySetInnerHTML={{__html: props.c}} />;
        }",
        json!({"c": "<b>x</b>"}),
    )
    .unwrap();
    assert_eq!(html, "<div><b>x</b></div>");
}

#[test]
fn list_rendering_with_map_and_index() {
    let html = render_dynamic_fragment(
        "function Template(props) {
            return <ol>{props.items.map((item, i) => <li>{i + 1}. {item}</li>)}</ol>;
        }",
        json!({"items": ["alpha", "beta"]}),
    )
    .unwrap();
    assert_eq!(html, "<ol><li>1. alpha</li><li>2. beta</li></ol>");
}

#[test]
fn sub_views_compose_with_props_and_children() {
    let html = render_dynamic_fragment(
        "function Card(props) {
            return <div className=\"p-4\"><h2>{props.title}</h2>{props.children}</div>;
        }
        function Template(props) {
            return <Card title={props.heading}><p>body</p></Card>;
        }",
        json!({"heading": "Hello"}),
    )
    .unwrap();
    assert_eq!(html, "<div class=\"p-4\"><h2>Hello</h2><p>body</p></div>");
}

#[test]
fn ternary_and_logical_conditionals() {
    let source = "function Template(props) {
        return <div>{props.paid ? <span>PAID</span> : <span>DUE</span>}{props.note && <p>{props.note}</p>}</div>;
    }";
    let paid = render_dynamic_fragment(source, json!({"paid": true})).unwrap();
    assert_eq!(paid, "<div><span>PAID</span></div>");
    let due =
        render_dynamic_fragment(source, json!({"paid": false, "note": "net 30"})).unwrap();
    assert_eq!(due, "<div><span>DUE</span><p>net 30</p></div>");
}

#[test]
fn arithmetic_and_to_fixed_in_templates() {
    let html = render_dynamic_fragment(
        "function Template(props) {
            const total = props.items.map((i) => i.qty * i.price);
            return <p>{`$${(total[0] + total[1]).toFixed(2)}`}</p>;
        }",
        json!({"items": [{"qty": 2, "price": 10}, {"qty": 1, "price": 5}]}),
    )
    .unwrap();
    assert_eq!(html, "<p>$25.00</p>");
}

#[test]
fn rendering_is_deterministic_across_runs() {
    let source = "function Template(props) {
        return <div style={{color: \"red\", fontSize: 12}}>{props.items.map((x) => <p>{x}</p>)}</div>;
    }";
    let props = json!({"items": [1, 2, 3]});
    let a = render_dynamic_fragment(source, props.clone()).unwrap();
    let b = render_dynamic_fragment(source, props).unwrap();
    assert_eq!(a, b);
}

// =====================================================================
// Sandbox containment
// =====================================================================

#[test]
fn host_capabilities_are_unreachable_from_templates() {
    for source in [
        "function Template(p) { return <div>{process.env.SECRET}</div>; }",
        "function Template(p) { return <div>{require(\"child_process\")}</div>; }",
        "function Template(p) { return <div>{fetch(\"http://evil\")}</div>; }",
        "function Template(p) { return <div>{globalThis}</div>; }",
        "function Template(p) { return <div>{__dirname}</div>; }",
    ] {
        let err = render_dynamic_fragment(source, json!({})).unwrap_err();
        assert!(
            matches!(err, RenderError::UnknownBinding(_)),
            "`{source}` should hit the sandbox, got {err:?}"
        );
    }
}

#[test]
fn runaway_templates_hit_budgets() {
    let err = render_dynamic_fragment(
        "function Template(p) { return <div><Template /></div>; }",
        json!({}),
    )
    .unwrap_err();
    assert_eq!(err, RenderError::DepthExceeded);
}

// =====================================================================
// Compile failures
// =====================================================================

#[test]
fn malformed_source_is_a_compile_error() {
    for source in [
        "",
        "function Template(p) { return <div><p>x</div>; }",
        "function Template(p) { return <div>x",
        "function Other(p) { return <p>x</p>; }",
        "not a template at all",
    ] {
        assert!(compile(source).is_err(), "`{source}` should not compile");
    }
}

#[test]
fn compile_failure_produces_no_pdf_on_the_pipeline() {
    let pipeline = Pipeline::new(EngineConfig::default());
    let err = pipeline
        .render_dynamic("<div>no function</div>", &json!({}), &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Compile(_)));
}

// =====================================================================
// Options
// =====================================================================

#[test]
fn default_options_are_letter_portrait_half_inch() {
    let setup = PageSetup::resolve(&RenderOptions::default()).unwrap();
    assert_eq!(setup.format, PaperFormat::Letter);
    assert!(!setup.landscape);
    assert_eq!(setup.margin.top.text, "0.5in");
    assert_eq!(setup.margin.right.text, "0.5in");
    assert_eq!(setup.margin.bottom.text, "0.5in");
    assert_eq!(setup.margin.left.text, "0.5in");
}

#[test]
fn wire_options_merge_over_defaults() {
    let options: RenderOptions = serde_json::from_value(json!({
        "format": "Legal",
        "margin": { "top": "1in", "bottom": "2cm" }
    }))
    .unwrap();
    let setup = PageSetup::resolve(&options).unwrap();
    assert_eq!(setup.format, PaperFormat::Legal);
    assert!(!setup.landscape);
    assert_eq!(setup.margin.top.inches, 1.0);
    assert!((setup.margin.bottom.inches - 0.7874).abs() < 1e-3);
    assert_eq!(setup.margin.left.text, "0.5in");
    assert_eq!(setup.margin.right.text, "0.5in");
}

#[test]
fn invalid_margin_is_rejected() {
    let options = RenderOptions {
        margin: Some(MarginOptions {
            top: Some("very wide".to_string()),
            ..MarginOptions::default()
        }),
        ..RenderOptions::default()
    };
    assert!(PageSetup::resolve(&options).is_err());
}

// =====================================================================
// Assembly
// =====================================================================

#[test]
fn assembled_document_inlines_the_utility_css() {
    let fragment = render_dynamic_fragment(
        "function Template(p) { return <div className=\"p-6\">x</div>; }",
        json!({}),
    )
    .unwrap();
    let doc = assemble(&fragment, style::utility_css(), "test");
    assert!(doc.starts_with("<!DOCTYPE html>"));
    assert!(doc.contains("<meta charset=\"utf-8\">"));
    assert!(doc.contains(".p-6 { padding: 1.5rem; }"));
    assert!(doc.contains("<div class=\"p-6\">x</div>"));
}

// =====================================================================
// Fixed templates
// =====================================================================

#[test]
fn invoice_math_scenario() {
    let props = json!({
        "invoiceNumber": "0042",
        "from": "Acme Corp",
        "to": "Client Inc",
        "items": [
            { "description": "A", "quantity": 2, "unitPrice": 10 },
            { "description": "B", "quantity": 1, "unitPrice": 5 }
        ]
    });
    let view = templates::view_for("invoice").unwrap();
    let html = render_fragment(&view, &props).unwrap();
    assert!(html.contains("$25.00"));
    assert!(html.contains("$2.50"));
    assert!(html.contains("$27.50"));
}

#[test]
fn fixed_templates_fail_loudly_on_bad_shapes() {
    // Validation passed (fields present) but an item is malformed: the
    // static path must surface the error, never a diagnostic document.
    let props = json!({
        "invoiceNumber": "1",
        "from": "a",
        "to": "b",
        "items": [{ "description": "A", "quantity": "two", "unitPrice": 10 }]
    });
    let view = templates::view_for("invoice").unwrap();
    assert!(render_fragment(&view, &props).is_err());
}

// =====================================================================
// HTTP surface (validation paths only; no engine contact)
// =====================================================================

#[tokio::test]
async fn missing_jsx_template_is_400() {
    let (status, body) = post_json(test_router(), "/api/pdf/render", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "jsxTemplate is required");
}

#[tokio::test]
async fn unknown_template_type_is_400() {
    let (status, body) = post_json(
        test_router(),
        "/api/pdf/generate",
        r#"{"templateType": "receipt", "data": {}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("unknown templateType"));
}

#[tokio::test]
async fn missing_template_type_is_400() {
    let (status, body) = post_json(test_router(), "/api/pdf/generate", r#"{"data": {}}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "templateType is required");
}

#[tokio::test]
async fn invoice_with_missing_fields_is_400() {
    let (status, body) = post_json(
        test_router(),
        "/api/pdf/invoice",
        r#"{"invoiceNumber": "1"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("from"));
    assert!(details.contains("to"));
    assert!(details.contains("items"));
}

#[tokio::test]
async fn components_catalog_is_served() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .uri("/api/pdf/components")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let catalog: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(catalog["templates"][0]["name"], "invoice");
    assert_eq!(catalog["templates"][1]["name"], "report");
}

#[tokio::test]
async fn health_endpoint_responds() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =====================================================================
// End to end (requires a local Chrome/Chromium; run with -- --ignored)
// =====================================================================

#[test]
#[ignore]
fn dynamic_template_to_pdf_bytes() {
    let pipeline = Pipeline::new(EngineConfig::default());
    let document = pipeline
        .render_dynamic(
            "function Template(props) { return <h1>{props.title}</h1>; }",
            &json!({"title": "End to end"}),
            &RenderOptions::default(),
        )
        .unwrap();
    assert!(document.bytes.len() > 100);
    assert_eq!(&document.bytes[0..5], b"%PDF-");
    assert_eq!(document.content_type, "application/pdf");
}

#[test]
#[ignore]
fn invoice_template_to_pdf_bytes() {
    let pipeline = Pipeline::new(EngineConfig::default());
    let document = pipeline
        .render_fixed(
            "invoice",
            &json!({
                "invoiceNumber": "0042",
                "from": "Acme Corp",
                "to": "Client Inc",
                "items": [{ "description": "A", "quantity": 2, "unitPrice": 10 }]
            }),
            &RenderOptions::default(),
        )
        .unwrap();
    assert_eq!(&document.bytes[0..5], b"%PDF-");
    assert_eq!(document.file_name, "document.pdf");
}
