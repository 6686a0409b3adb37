//! HTTP Server for the hookmap API.
//!
//! # API Endpoints
//!
//! | Method | Path                    | Description                              |
//! |--------|-------------------------|------------------------------------------|
//! | GET    | `/health`               | Health check                             |
//! | GET    | `/api/templates`        | List available templates                 |
//! | GET    | `/api/templates/{name}` | One template                             |
//! | POST   | `/api/batch/process`    | Map, transform and validate a batch      |
//! | POST   | `/api/batch/export`     | Same, returned as data/validation sheets |
//! | GET    | `/api/logs`             | SSE stream for real-time logs            |

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LogEntry, LogLevel, LOG_BROADCASTER};
use super::types::{error_response, new_job_id, BatchResponse, ExportResponse};
use crate::error::{BatchError, ServerError, ServerResult, TemplateError};
use crate::export::{data_sheet, validation_sheet};
use crate::models::{BatchInput, ReferenceData, Template};
use crate::parser::parse_batch_input;
use crate::registry::TemplateRegistry;
use crate::transform::{process_with_template, BatchOutput};

type ApiError = (StatusCode, Json<Value>);

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TemplateRegistry>,
    /// Used when a request carries no reference data of its own.
    pub references: Arc<ReferenceData>,
}

impl AppState {
    pub fn new(registry: TemplateRegistry, references: ReferenceData) -> Self {
        Self {
            registry: Arc::new(registry),
            references: Arc::new(references),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/{name}", get(get_template))
        .route("/api/batch/process", post(process))
        .route("/api/batch/export", post(export))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("hookmap server running on http://localhost:{}", port);
    eprintln!("   POST /api/batch/process - Process a batch");
    eprintln!("   POST /api/batch/export  - Process and export a batch");
    eprintln!("   GET  /api/templates     - List templates");
    eprintln!("   GET  /api/logs          - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hookmap",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "process": "POST /api/batch/process",
            "export": "POST /api/batch/export",
            "templates": "GET /api/templates",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn list_templates(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let templates = state.registry.list().map_err(|e| reject(e.into()))?;
    let summaries: Vec<Value> = templates
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "version": t.version,
                "description": t.description,
                "fields": t.fields.len()
            })
        })
        .collect();
    Ok(Json(json!({ "templates": summaries })))
}

async fn get_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Template>, ApiError> {
    state
        .registry
        .get(&name)
        .map(Json)
        .map_err(|e| reject(e.into()))
}

async fn process(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<BatchResponse>, ApiError> {
    let job_id = new_job_id();
    let (input, _, output) = run_batch(&state, &job_id, body).map_err(reject)?;
    Ok(Json(BatchResponse::new(
        job_id,
        &input.template_name,
        input.rows.len(),
        output,
    )))
}

async fn export(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ExportResponse>, ApiError> {
    let job_id = new_job_id();
    let (_, template, output) = run_batch(&state, &job_id, body).map_err(reject)?;

    let data = data_sheet(&template, &output).map_err(|e| reject(e.into()))?;
    let validation = validation_sheet(&output).map_err(|e| reject(e.into()))?;

    Ok(Json(ExportResponse {
        job_id,
        status: if validation.is_some() { "warning" } else { "ready" }.to_string(),
        data_sheet: data,
        validation_sheet: validation,
    }))
}

fn run_batch(
    state: &AppState,
    job_id: &str,
    body: Value,
) -> ServerResult<(BatchInput, Template, BatchOutput)> {
    let mut input = parse_batch_input(body)?;
    if input.references.is_empty() {
        input.references = (*state.references).clone();
    }

    LOG_BROADCASTER.log(
        LogEntry::new(
            LogLevel::Info,
            format!("{} rows, template {}", input.rows.len(), input.template_name),
        )
        .with_job(job_id),
    );

    let template = state.registry.get(&input.template_name)?;
    let output = process_with_template(&input, &template)?;
    Ok((input, template, output))
}

fn reject(err: ServerError) -> ApiError {
    let status = match err {
        ServerError::Batch(BatchError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        ServerError::Batch(BatchError::Template(TemplateError::NotFound(_))) => StatusCode::NOT_FOUND,
        ServerError::Batch(BatchError::Template(TemplateError::Invalid(_)))
        | ServerError::Batch(BatchError::Configuration(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log_error(err.to_string());
    (status, Json(error_response(&err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BUSINESS_FIELDS_TEMPLATE;
    use tempfile::tempdir;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempdir().unwrap();
        let state = AppState::new(TemplateRegistry::with_dir(dir.path()), ReferenceData::default());
        (dir, state)
    }

    #[test]
    fn test_run_batch_unknown_template() {
        let (_dir, state) = state();
        let err = run_batch(&state, "job", json!({ "rows": [], "templateName": "Nope" })).unwrap_err();
        assert_eq!(reject(err).0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_run_batch_bad_input() {
        let (_dir, state) = state();
        let err = run_batch(&state, "job", json!({ "templateName": "Nope" })).unwrap_err();
        assert_eq!(reject(err).0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_run_batch_logs_under_job_id() {
        use tokio::sync::broadcast::error::TryRecvError;

        let (_dir, state) = state();
        let mut rx = LOG_BROADCASTER.subscribe();
        run_batch(&state, "job-42", json!({ "rows": [], "templateName": BUSINESS_FIELDS_TEMPLATE }))
            .unwrap();

        let mut tagged = None;
        loop {
            match rx.try_recv() {
                Ok(entry) if entry.job_id.as_deref() == Some("job-42") => {
                    tagged = Some(entry);
                    break;
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        let entry = tagged.expect("job-tagged entry");
        assert_eq!(entry.level, LogLevel::Info);
        assert!(entry.message.contains(BUSINESS_FIELDS_TEMPLATE));
    }

    #[test]
    fn test_run_batch_uses_default_references() {
        let (_dir, mut state) = state();
        state.references = Arc::new(ReferenceData {
            locations: vec![crate::models::ReferenceEntry::named("DK1")],
            accounts: vec![],
            account_styles: vec![crate::models::ReferenceEntry::named("Electricity")],
        });

        let body = json!({
            "rows": [{ "org": "Acme", "area": "DK1", "style": "Electricity" }],
            "templateName": BUSINESS_FIELDS_TEMPLATE,
            "fieldMappings": [
                { "label": "Organization", "sourcePath": "org" },
                { "label": "Location", "sourcePath": "area" },
                { "label": "Account Style Caption", "sourcePath": "style" }
            ]
        });
        let (_, template, output) = run_batch(&state, "job", body).unwrap();
        assert_eq!(template.name, BUSINESS_FIELDS_TEMPLATE);
        assert!(output.validation_errors.is_empty(), "{:?}", output.validation_errors);
    }
}
