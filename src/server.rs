//! HTTP API.
//!
//! A thin JSON layer over [`ServiceContext`]; all retrieval and answering
//! happens there.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner with document count |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/debug` | Index statistics |
//! | `GET`  | `/ask?q=` | Answer a question with source attribution |
//! | `GET`  | `/search?q=&k=` | Ranked chunks with scores |
//! | `POST` | `/reload` | Reload the index artifact from disk |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must be at least 2 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the textbook site can
//! call the API from the browser.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use textbook_rag_core::RagError;

use crate::answer::Answer;
use crate::service::{SearchHit, ServiceContext};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    ctx: Arc<ServiceContext>,
}

/// Build the router with every endpoint and the CORS layer.
pub fn router(ctx: Arc<ServiceContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/debug", get(handle_debug))
        .route("/ask", get(handle_ask))
        .route("/search", get(handle_search))
        .route("/reload", post(handle_reload))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(AppState { ctx })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(ctx: Arc<ServiceContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config().server.bind.clone();
    let snapshot = ctx.current();
    if snapshot.demo {
        tracing::warn!("serving the DEMO index; answers are not drawn from the real corpus");
    }

    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Textbook RAG API listening on http://{}", bind_addr);
    println!("  documents: {}", snapshot.index.len());
    println!("  try: http://{}/ask?q=What%20is%20Physical%20AI", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Client mistakes map to 400, everything else came from the answerer.
fn classify_ask_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<RagError>() {
        Some(e @ RagError::InvalidQuery(_)) => bad_request(e.to_string()),
        _ => {
            tracing::error!(error = %format!("{:#}", err), "answer generation failed");
            upstream_error(format!("answer generation failed: {:#}", err))
        }
    }
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: "no such endpoint".to_string(),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct HomeResponse {
    message: &'static str,
    status: &'static str,
    documents: usize,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_home(State(state): State<AppState>) -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "Textbook RAG API",
        status: "running",
        documents: state.ctx.current().index.len(),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "/health",
            "/ask?q=question",
            "/search?q=query&k=3",
            "/debug",
            "/reload",
        ],
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /debug ============

#[derive(Serialize)]
struct DebugResponse {
    documents_count: usize,
    sample_document: String,
    sources_count: usize,
    vocabulary_size: usize,
    demo: bool,
    built_at: Option<String>,
    corpus_fingerprint: Option<String>,
}

async fn handle_debug(State(state): State<AppState>) -> Json<DebugResponse> {
    let snapshot = state.ctx.current();
    let chunks = snapshot.index.chunks();
    let mut labels: Vec<&str> = chunks.iter().map(|c| c.source_label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();

    let sample_document = match chunks.first() {
        Some(c) => format!("{}...", c.text.chars().take(100).collect::<String>()),
        None => "No documents".to_string(),
    };

    Json(DebugResponse {
        documents_count: chunks.len(),
        sample_document,
        sources_count: labels.len(),
        vocabulary_size: snapshot.index.vocabulary().len(),
        demo: snapshot.demo,
        built_at: snapshot.built_at.map(|t| t.to_rfc3339()),
        corpus_fingerprint: snapshot.corpus_fingerprint.clone(),
    })
}

// ============ GET /ask ============

#[derive(Deserialize)]
struct AskParams {
    q: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    params: Result<Query<AskParams>, QueryRejection>,
) -> Result<Json<Answer>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let q = params
        .q
        .ok_or_else(|| bad_request("missing query parameter: q"))?;
    tracing::info!(question = %q, "ask");

    let answer = state.ctx.ask(&q).await.map_err(classify_ask_error)?;
    tracing::info!(chars = answer.answer.len(), sources = answer.sources.len(), "answered");
    Ok(Json(answer))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

/// Wire shape of one hit.
#[derive(Serialize)]
struct SearchResult {
    chunk_text: String,
    source_label: String,
    score: f64,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk_text: hit.chunk_text,
            source_label: hit.source_label,
            score: hit.score,
        }
    }
}

async fn handle_search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let q = params
        .q
        .ok_or_else(|| bad_request("missing query parameter: q"))?;
    if params.k == Some(0) {
        return Err(bad_request("k must be >= 1"));
    }

    let results = state
        .ctx
        .search(&q, params.k)
        .into_iter()
        .map(SearchResult::from)
        .collect();
    Ok(Json(SearchResponse { results }))
}

// ============ POST /reload ============

#[derive(Serialize)]
struct ReloadResponse {
    documents: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let ctx = state.ctx.clone();
    let documents = tokio::task::spawn_blocking(move || ctx.reload())
        .await
        .map_err(|e| internal(format!("reload task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(error = %e, "reload failed; keeping current index");
            internal(format!("reload failed: {:#}", e))
        })?;
    Ok(Json(ReloadResponse { documents }))
}
