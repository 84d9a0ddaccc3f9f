//! HTTP Server for the reestr API.
//!
//! Provides REST endpoints for the upload / select / transform / download
//! workflow. Sessions live in a [`SessionRegistry`] shared through axum state.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                     |
//! |--------|-----------------------------------|---------------------------------|
//! | GET    | `/health`                         | Health check                    |
//! | GET    | `/api/operations`                 | Available operations            |
//! | POST   | `/api/sessions`                   | Upload a CSV/XLSX file          |
//! | GET    | `/api/sessions/{id}`              | Session state                   |
//! | PUT    | `/api/sessions/{id}/selection`    | Choose ID and phone columns     |
//! | POST   | `/api/sessions/{id}/operations`   | Apply an operation              |
//! | GET    | `/api/sessions/{id}/preview`      | Working table preview           |
//! | GET    | `/api/sessions/{id}/download`     | Registry file                   |
//! | DELETE | `/api/sessions/{id}`              | Close a session                 |
//! | GET    | `/api/logs`                       | SSE stream for real-time logs   |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post, put},
    Router,
};
use chrono::Local;
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use super::logs::{log_error, log_session, LogEntry, LOG_BROADCASTER};
use super::types::{
    error_response, history_of, operation_infos, DownloadQuery, OperationInfo, OperationRequest,
    OperationResponse, PreviewQuery, SelectionRequest, SelectionResponse, SessionResponse,
    TablePreview,
};
use crate::cache::SessionRegistry;
use crate::config::ServerConfig;
use crate::error::{ExportError, ParseError, PipelineError, ServerError, ServerResult, SessionError};
use crate::export::ExportOptions;
use crate::parser::parse_bytes;
use crate::session::{SelectionChange, Session, RESULT_PREVIEW_ROWS, UPLOAD_PREVIEW_ROWS};

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Mutex<SessionRegistry>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(SessionRegistry::new(config.session_ttl))),
            config: Arc::new(config),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Permissive CORS for the browser UI
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/operations", get(list_operations))
        .route("/api/sessions", post(upload_file))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/selection", put(select_columns))
        .route("/api/sessions/{id}/operations", post(apply_operation))
        .route("/api/sessions/{id}/preview", get(preview))
        .route("/api/sessions/{id}/download", get(download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let app = build_router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Reestr server running on http://localhost:{}", port);
    println!("   POST /api/sessions                 - Upload CSV/XLSX file");
    println!("   PUT  /api/sessions/{{id}}/selection  - Choose columns");
    println!("   POST /api/sessions/{{id}}/operations - Apply operation");
    println!("   GET  /api/sessions/{{id}}/download   - Download registry");
    println!("   GET  /api/logs                     - SSE log stream");
    println!("   GET  /health                       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// Error mapping
// =============================================================================

impl ServerError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Session(e) => session_status(e),
            ServerError::Pipeline(e) => pipeline_status(e),
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Session(e) => session_status(e),
        PipelineError::Parse(ParseError::Io(_))
        | PipelineError::Export(ExportError::Io(_) | ExportError::Csv(_))
        | PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log_error(self.to_string());
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.registry.lock().await.len();
    Json(json!({
        "status": "ok",
        "service": "reestr",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": sessions,
        "outputEncoding": state.config.output_encoding.label(),
    }))
}

async fn list_operations() -> Json<Vec<OperationInfo>> {
    Json(operation_infos())
}

/// SSE endpoint for real-time log streaming
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

/// Upload endpoint: parse the file and open a session
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<SessionResponse>)> {
    let limit = state.config.max_upload_bytes;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge { size: limit + 1, limit }
        } else {
            ServerError::BadRequest(format!("Multipart error: {}", e.body_text()))
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| ServerError::BadRequest("File field has no file name".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e.body_text())))?;
        upload = Some((name, data.to_vec()));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    if bytes.len() > limit {
        return Err(ServerError::PayloadTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    let parse_name = file_name.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_bytes(&bytes, &parse_name))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(PipelineError::from)?;

    let session = Session::new(file_name, parsed);
    let mut registry = state.registry.lock().await;
    let id = registry.insert(session);
    let session = registry.get_mut(&id)?;

    let response = SessionResponse::new(&id, session, UPLOAD_PREVIEW_ROWS, RESULT_PREVIEW_ROWS);
    log_session(
        &id,
        LogEntry::success(format!(
            "{} rows, {} columns",
            response.row_count,
            response.columns.len()
        )),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SessionResponse>> {
    let mut registry = state.registry.lock().await;
    let session = registry.get_mut(&id)?;
    Ok(Json(SessionResponse::new(
        &id,
        session,
        UPLOAD_PREVIEW_ROWS,
        RESULT_PREVIEW_ROWS,
    )))
}

async fn select_columns(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SelectionRequest>,
) -> ServerResult<Json<SelectionResponse>> {
    let mut registry = state.registry.lock().await;
    let session = registry.get_mut(&id)?;

    let change = session.select_columns(request.clone())?;
    let reset = change == SelectionChange::Reset;
    if reset {
        log_session(
            &id,
            LogEntry::info(format!(
                "Working table reset: ID '{}', phone '{}'",
                request.id_column, request.phone_column
            )),
        );
    }

    Ok(Json(SelectionResponse {
        session_id: id,
        selection: request,
        reset,
        preview: TablePreview::of(&session.preview(RESULT_PREVIEW_ROWS)?, RESULT_PREVIEW_ROWS),
    }))
}

async fn apply_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<OperationRequest>,
) -> ServerResult<Json<OperationResponse>> {
    let mut registry = state.registry.lock().await;
    let session = registry.get_mut(&id)?;

    let step = request.step();
    let preview = match session.apply_step(step) {
        Ok(table) => TablePreview::of(table, RESULT_PREVIEW_ROWS),
        Err(e) => {
            log_session(&id, LogEntry::error(format!("{} failed: {}", step, e)));
            return Err(e.into());
        }
    };
    log_session(&id, LogEntry::success(format!("Applied {}", step)));

    Ok(Json(OperationResponse {
        session_id: id,
        applied: step.to_string(),
        history: history_of(session),
        preview,
    }))
}

async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> ServerResult<Json<TablePreview>> {
    let rows = query.rows.unwrap_or(RESULT_PREVIEW_ROWS);
    let mut registry = state.registry.lock().await;
    let session = registry.get_mut(&id)?;
    let working = session.working().ok_or(SessionError::NoSelection)?;
    Ok(Json(TablePreview::of(working, rows)))
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ServerResult<Response> {
    let options = ExportOptions {
        encoding: query.encoding.unwrap_or(state.config.output_encoding),
    };

    let mut registry = state.registry.lock().await;
    let session = registry.get_mut(&id)?;
    let file = session.export(&options, Local::now().date_naive())?;
    log_session(
        &id,
        LogEntry::success(format!("Exported {} ({} rows)", file.file_name, file.row_count())),
    );

    let headers = [
        (
            header::CONTENT_TYPE,
            format!("text/csv; charset={}", file.encoding.label()),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.file_name),
        ),
    ];
    Ok((headers, file.content).into_response())
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    state.registry.lock().await.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
