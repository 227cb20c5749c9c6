//! HTTP surface – axum routes over the rendering pipeline.
//!
//! Rendering is CPU/engine-bound, so each request runs the pipeline inside
//! `spawn_blocking` under a whole-request deadline. Errors map onto a JSON
//! envelope `{ "error": …, "details"?: … }`; validation failures are 400,
//! everything else 500.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::EngineConfig;
use crate::error::{EngineError, PipelineError};
use crate::options::RenderOptions;
use crate::pipeline::{props_or_empty, Pipeline, RenderedDocument};
use crate::templates;

/// Upper bound on a whole request, engine launch included.
const REQUEST_DEADLINE: Duration = Duration::from_secs(90);

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the service router.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/pdf/invoice", post(invoice))
        .route("/api/pdf/report", post(report))
        .route("/api/pdf/generate", post(generate))
        .route("/api/pdf/render", post(render_dynamic))
        .route("/api/pdf/components", get(components))
        .route("/api/health", get(health))
        .with_state(AppState { pipeline })
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, engine: EngineConfig) -> std::io::Result<()> {
    let pipeline = Arc::new(Pipeline::new(engine));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, router(pipeline)).await
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateRequest {
    template_type: Option<String>,
    data: Value,
    options: RenderOptions,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            template_type: None,
            data: Value::Null,
            options: RenderOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DynamicRenderRequest {
    jsx_template: Option<String>,
    data: Value,
    options: RenderOptions,
}

impl Default for DynamicRenderRequest {
    fn default() -> Self {
        Self {
            jsx_template: None,
            data: Value::Null,
            options: RenderOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn invoice(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<PdfResponse, ApiError> {
    run_fixed(state, "invoice".to_string(), body, RenderOptions::default()).await
}

async fn report(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<PdfResponse, ApiError> {
    run_fixed(state, "report".to_string(), body, RenderOptions::default()).await
}

async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<PdfResponse, ApiError> {
    let template_type = body
        .template_type
        .ok_or_else(|| ApiError::bad_request("templateType is required", None))?;
    run_fixed(state, template_type, body.data, body.options).await
}

async fn render_dynamic(
    State(state): State<AppState>,
    Json(body): Json<DynamicRenderRequest>,
) -> Result<PdfResponse, ApiError> {
    let source = body
        .jsx_template
        .ok_or_else(|| ApiError::bad_request("jsxTemplate is required", None))?;
    let data = props_or_empty(body.data);
    let options = body.options;
    let pipeline = state.pipeline.clone();
    let document =
        render_blocking(move || pipeline.render_dynamic(&source, &data, &options)).await?;
    Ok(PdfResponse(document))
}

async fn components() -> Json<Value> {
    Json(templates::component_catalog())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_fixed(
    state: AppState,
    template_type: String,
    data: Value,
    options: RenderOptions,
) -> Result<PdfResponse, ApiError> {
    let data = props_or_empty(data);
    let pipeline = state.pipeline.clone();
    let document =
        render_blocking(move || pipeline.render_fixed(&template_type, &data, &options)).await?;
    Ok(PdfResponse(document))
}

/// Run a pipeline call on the blocking pool under the request deadline.
///
/// On deadline expiry the blocking task keeps running in the background
/// until its engine guard releases the browser; only the response is
/// abandoned.
async fn render_blocking<F>(work: F) -> Result<RenderedDocument, ApiError>
where
    F: FnOnce() -> Result<RenderedDocument, PipelineError> + Send + 'static,
{
    match tokio::time::timeout(REQUEST_DEADLINE, tokio::task::spawn_blocking(work)).await {
        Err(_) => Err(ApiError::from(PipelineError::Engine(EngineError::Timeout(
            "request deadline",
        )))),
        Ok(Err(join_error)) => Err(ApiError::internal(
            "render worker failed",
            Some(join_error.to_string()),
        )),
        Ok(Ok(result)) => result.map_err(ApiError::from),
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

struct PdfResponse(RenderedDocument);

impl IntoResponse for PdfResponse {
    fn into_response(self) -> Response {
        let file_name: String = self
            .0
            .file_name
            .chars()
            .filter(|c| !c.is_control() && *c != '"')
            .collect();
        (
            [
                (header::CONTENT_TYPE, self.0.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            self.0.bytes,
        )
            .into_response()
    }
}

/// JSON error envelope.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(error: &str, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.to_string(),
            details,
        }
    }

    fn internal(error: &str, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.to_string(),
            details,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match &error {
            PipelineError::Validation(v) => {
                ApiError::bad_request("validation failed", Some(v.to_string()))
            }
            PipelineError::Compile(c) => {
                ApiError::internal("template compilation failed", Some(c.to_string()))
            }
            PipelineError::Render(r) => {
                ApiError::internal("template render failed", Some(r.to_string()))
            }
            PipelineError::Engine(e) => {
                ApiError::internal("pdf rendering failed", Some(e.to_string()))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.error });
        if let Some(details) = self.details {
            body["details"] = Value::String(details);
        }
        (self.status, Json(body)).into_response()
    }
}
