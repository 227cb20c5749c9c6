//! Error taxonomy for the rendering pipeline.
//!
//! Each stage has its own error type; [`PipelineError`] unifies them for the
//! HTTP layer, which maps validation failures to 400 and everything else to
//! 500 (see `server`).

use thiserror::Error;

/// The caller's payload is missing required fields or contains invalid values.
///
/// Detected before any view function is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {0}")]
    MissingFields(String),
    #[error("unknown templateType `{0}`")]
    UnknownTemplateType(String),
    #[error("invalid length `{0}` (expected a number with an in/cm/mm/px suffix, e.g. `0.5in`)")]
    InvalidLength(String),
}

/// A dynamic template source failed to parse.
///
/// Carries the position of the offending token so the diagnostic can be
/// surfaced verbatim in the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// A view function failed while producing its element tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown binding `{0}` (templates can only reference their props)")]
    UnknownBinding(String),
    #[error("`{0}` is not a defined view")]
    UnknownView(String),
    #[error("cannot read property `{0}` of null")]
    NullAccess(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("evaluation budget exhausted (template too large or non-terminating)")]
    BudgetExhausted,
    #[error("nesting too deep (views may not recurse unboundedly)")]
    DepthExceeded,
    #[error("{0}")]
    Props(String),
}

/// The headless rendering engine failed to launch, navigate, or print.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("failed to launch rendering engine: {0}")]
    Launch(String),
    #[error("page navigation failed: {0}")]
    Navigate(String),
    #[error("print to PDF failed: {0}")]
    Print(String),
    #[error("rendering engine timed out during {0}")]
    Timeout(&'static str),
}

/// Any failure a request can hit between payload and PDF bytes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("template compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("template render failed: {0}")]
    Render(#[from] RenderError),
    #[error("rendering engine failed: {0}")]
    Engine(#[from] EngineError),
}
