//! Pipeline – ties compilation, rendering, assembly, and printing into a
//! single per-request call.
//!
//! Stages run strictly sequentially within a request. The fixed-template
//! path fails loudly on any view error; the dynamic path substitutes a
//! diagnostic fragment for *runtime* view failures so a best-effort PDF is
//! still produced (compile failures return an error, not a PDF).

use serde_json::{Map, Value as Json};

use crate::assemble::assemble;
use crate::compiler;
use crate::element::{Element, ElementNode};
use crate::engine::{EngineConfig, EnginePool};
use crate::error::{PipelineError, RenderError, ValidationError};
use crate::options::{PageSetup, RenderOptions};
use crate::render::{render_fragment, write_element, View};
use crate::style;
use crate::templates;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// An immutable rendered document: PDF bytes plus response metadata.
#[derive(Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
}

/// The per-process pipeline. Holds the engine pool; everything else is
/// stateless.
pub struct Pipeline {
    pool: EnginePool,
}

impl Pipeline {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            pool: EnginePool::new(engine),
        }
    }

    /// Render a fixed template (`invoice` / `report`).
    pub fn render_fixed(
        &self,
        template_type: &str,
        data: &Json,
        options: &RenderOptions,
    ) -> Result<RenderedDocument, PipelineError> {
        let view = templates::view_for(template_type).ok_or_else(|| {
            ValidationError::UnknownTemplateType(template_type.to_string())
        })?;
        templates::validate_props(template_type, data)?;
        let setup = PageSetup::resolve(options)?;

        log::info!("rendering fixed template `{template_type}`");
        let fragment = render_fragment(&view, data)?;
        self.print(&fragment, setup)
    }

    /// Render a dynamic template from untrusted source text.
    pub fn render_dynamic(
        &self,
        source: &str,
        data: &Json,
        options: &RenderOptions,
    ) -> Result<RenderedDocument, PipelineError> {
        let setup = PageSetup::resolve(options)?;
        let template = compiler::compile(source)?;
        let view = View::Dynamic(template);

        log::info!("rendering dynamic template ({} bytes of source)", source.len());
        let fragment = match render_fragment(&view, data) {
            Ok(fragment) => fragment,
            Err(e) => {
                // Best-effort: the sandbox endpoint still produces a
                // diagnostic PDF for runtime view failures.
                log::warn!("dynamic template failed at render time: {e}");
                diagnostic_fragment(&e)
            }
        };
        self.print(&fragment, setup)
    }

    fn print(
        &self,
        fragment: &str,
        setup: PageSetup,
    ) -> Result<RenderedDocument, PipelineError> {
        let html = assemble(fragment, style::utility_css(), setup.title());
        let bytes = self.pool.render_pdf(&html, &setup)?;
        log::info!("rendered `{}` ({} bytes)", setup.file_name, bytes.len());
        Ok(RenderedDocument {
            bytes,
            file_name: setup.file_name,
            content_type: PDF_CONTENT_TYPE,
        })
    }
}

/// Normalize request `data` into a props object (absent/null becomes `{}`).
pub fn props_or_empty(data: Json) -> Json {
    if data.is_null() {
        Json::Object(Map::new())
    } else {
        data
    }
}

/// The fragment substituted on the dynamic path when a view fails at
/// runtime. Built through the regular serializer so the diagnostic message
/// is escaped.
fn diagnostic_fragment(error: &RenderError) -> String {
    let tree: Element = ElementNode::new("div")
        .class("p-6")
        .child(
            ElementNode::new("h1")
                .class("text-2xl font-bold text-red-500 mb-4")
                .text("Template render failed"),
        )
        .child(
            ElementNode::new("p")
                .class("text-sm text-gray-700")
                .text(error.to_string()),
        )
        .into();
    let mut out = String::new();
    write_element(&tree, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn props_normalization() {
        assert_eq!(props_or_empty(Json::Null), json!({}));
        assert_eq!(props_or_empty(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn diagnostic_fragment_escapes_the_message() {
        let fragment =
            diagnostic_fragment(&RenderError::UnknownBinding("<script>".to_string()));
        assert!(fragment.contains("Template render failed"));
        assert!(fragment.contains("&lt;script&gt;"));
        assert!(!fragment.contains("`<script>`"));
    }

    #[test]
    fn unknown_template_type_is_a_validation_error() {
        let pipeline = Pipeline::new(EngineConfig::default());
        let err = pipeline
            .render_fixed("receipt", &json!({}), &RenderOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Validation(ValidationError::UnknownTemplateType(
                "receipt".to_string()
            ))
        );
    }

    #[test]
    fn missing_fields_fail_before_any_engine_work() {
        let pipeline = Pipeline::new(EngineConfig::default());
        let err = pipeline
            .render_fixed("invoice", &json!({}), &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingFields(_))
        ));
    }

    #[test]
    fn compile_errors_surface_without_a_pdf() {
        let pipeline = Pipeline::new(EngineConfig::default());
        let err = pipeline
            .render_dynamic(
                "function Template(p) { return <div><p>x</div>; }",
                &json!({}),
                &RenderOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Compile(_)));
    }
}
