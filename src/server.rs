//! HTTP API.
//!
//! # Endpoints
//!
//! All routes except `/health` live under `/api/v1`.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/research` | Research a topic and store the session |
//! | `GET` | `/research/{id}` | Fetch a stored research session |
//! | `POST` | `/outline` | Generate an outline |
//! | `POST` | `/draft` | Write a draft from `outline_id` or `topic` |
//! | `POST` | `/explain` | Explain a concept |
//! | `POST` | `/seo/optimize` | SEO report for a piece of content |
//! | `POST` | `/knowledge/upload` | Chunk, embed and store a document |
//! | `POST` | `/knowledge/search` | Semantic search over a collection |
//! | `GET` | `/knowledge?owner=` | List an owner's documents |
//! | `GET` | `/knowledge/{id}` | Fetch a document with its chunks |
//! | `DELETE` | `/knowledge/{id}` | Delete a document and its vectors |
//! | `POST` | `/workflow/blog` | Run the full blog workflow |
//! | `GET` | `/workflow/status` | Describe the workflow |
//! | `GET` | `/content/{id}` | Fetch a generated artifact |
//! | `GET` | `/content?owner=` | List an owner's artifacts |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "kind": "invalid_request", "message": "topic must be at least 3 characters (got 1)" }
//! ```
//!
//! | Kind | Status |
//! |------|--------|
//! | `invalid_request` | 400 |
//! | `not_found` | 404 |
//! | `dimension_mismatch_error` | 500 |
//! | `fatal_provider_error`, `schema_validation_error` | 502 |
//! | `transient_provider_error` | 503 |
//! | `internal` | 500 |
//!
//! A failed workflow run also carries `step` and the last good `state`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use blogforge_core::error::{classify, Error};

use crate::content::{DraftParams, ExplainParams, OutlineParams, ResearchParams, SeoParams};
use crate::context::AppContext;
use crate::knowledge::{default_owner, SearchRequest, UploadRequest};
use crate::workflow::{as_failure, BlogParams};

type AppState = Arc<AppContext>;
type ApiResult<T> = Result<Json<T>, AppError>;

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(ctx: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/research", post(handle_research))
        .route("/research/{id}", get(handle_get_research))
        .route("/outline", post(handle_outline))
        .route("/draft", post(handle_draft))
        .route("/explain", post(handle_explain))
        .route("/seo/optimize", post(handle_seo))
        .route("/knowledge/upload", post(handle_upload))
        .route("/knowledge/search", post(handle_search))
        .route("/knowledge", get(handle_list_knowledge))
        .route(
            "/knowledge/{id}",
            get(handle_get_knowledge).delete(handle_delete_knowledge),
        )
        .route("/workflow/blog", post(handle_workflow))
        .route("/workflow/status", get(handle_workflow_status))
        .route("/content", get(handle_list_content))
        .route("/content/{id}", get(handle_get_content));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Serve on `[server].bind` until Ctrl-C, then close the pool.
pub async fn run_server(ctx: AppState) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = router(ctx.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "blogforge API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    ctx.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: String,
    message: String,
    step: Option<String>,
    state: Option<serde_json::Value>,
}

fn status_for(err: Option<&Error>) -> (StatusCode, &'static str) {
    match err {
        Some(e @ Error::TransientProvider(_)) => (StatusCode::SERVICE_UNAVAILABLE, e.kind()),
        Some(e @ Error::FatalProvider(_)) => (StatusCode::BAD_GATEWAY, e.kind()),
        Some(e @ Error::SchemaValidation { .. }) => (StatusCode::BAD_GATEWAY, e.kind()),
        Some(e @ Error::DimensionMismatch { .. }) => (StatusCode::INTERNAL_SERVER_ERROR, e.kind()),
        Some(e @ Error::NotFound { .. }) => (StatusCode::NOT_FOUND, e.kind()),
        Some(e @ Error::InvalidRequest(_)) => (StatusCode::BAD_REQUEST, e.kind()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(failure) = as_failure(&err) {
            let (status, kind) = status_for(failure.kind());
            return AppError {
                status,
                kind: kind.to_string(),
                message: format!("{:#}", failure.error),
                step: Some(failure.step.as_str().to_string()),
                state: serde_json::to_value(&failure.state).ok(),
            };
        }

        let (status, kind) = status_for(classify(&err));
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", err), kind, "request failed");
        }
        AppError {
            status,
            kind: kind.to_string(),
            message: format!("{:#}", err),
            step: None,
            state: None,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request".to_string(),
            message: rejection.body_text(),
            step: None,
            state: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind,
            message: self.message,
            step: self.step,
            state: self.state,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct OwnerQuery {
    #[serde(default = "default_owner")]
    owner: String,
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Research ============

async fn handle_research(
    State(ctx): State<AppState>,
    payload: Result<Json<ResearchParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.content.research(params).await?))
}

async fn handle_get_research(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.content.get_research(&id).await?))
}

// ============ Generation ============

async fn handle_outline(
    State(ctx): State<AppState>,
    payload: Result<Json<OutlineParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.content.outline(params).await?))
}

async fn handle_draft(
    State(ctx): State<AppState>,
    payload: Result<Json<DraftParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.content.draft(params).await?))
}

async fn handle_explain(
    State(ctx): State<AppState>,
    payload: Result<Json<ExplainParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.content.explain(params).await?))
}

async fn handle_seo(
    State(ctx): State<AppState>,
    payload: Result<Json<SeoParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.content.optimize_seo(params).await?))
}

// ============ Knowledge ============

async fn handle_upload(
    State(ctx): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(request) = payload?;
    Ok(Json(ctx.knowledge.upload(request).await?))
}

async fn handle_search(
    State(ctx): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(request) = payload?;
    Ok(Json(ctx.knowledge.search(&request).await?))
}

async fn handle_list_knowledge(
    State(ctx): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.knowledge.list(&query.owner).await?))
}

async fn handle_get_knowledge(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.knowledge.get(&id).await?))
}

async fn handle_delete_knowledge(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.knowledge.delete(&id).await?))
}

// ============ Workflow ============

async fn handle_workflow(
    State(ctx): State<AppState>,
    payload: Result<Json<BlogParams>, JsonRejection>,
) -> ApiResult<impl Serialize> {
    let Json(params) = payload?;
    Ok(Json(ctx.workflow.run(params).await?))
}

async fn handle_workflow_status(State(ctx): State<AppState>) -> Json<impl Serialize> {
    Json(ctx.workflow.info())
}

// ============ Content ============

async fn handle_list_content(
    State(ctx): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.content.list_content(&query.owner).await?))
}

async fn handle_get_content(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl Serialize> {
    Ok(Json(ctx.content.get_content(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::TransientProvider("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::FatalProvider("x".into()), StatusCode::BAD_GATEWAY),
            (
                Error::SchemaValidation {
                    schema: "outline".into(),
                    message: "x".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::DimensionMismatch {
                    collection: "c".into(),
                    expected: 2,
                    actual: 3,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (Error::not_found("document", "d"), StatusCode::NOT_FOUND),
            (Error::invalid("x"), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            let app: AppError = anyhow::Error::from(err).into();
            assert_eq!(app.status, status);
        }

        let app: AppError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.kind, "internal");
    }
}
