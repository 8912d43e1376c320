//! HTTP API
//!
//! JSON over HTTP. Errors are returned as `{"error": <message>, "code": <code>}`
//! where `code` is the stable identifier from `Error::code`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use recplay_common::{
    AiRequest, AiRequestKind, Error, NewTestCase, ReplayRequest, SaveRecordingRequest,
    StartRecordingRequest, StartRecordingResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::context::AppContext;

/// Error wrapper mapping the shared taxonomy onto HTTP statuses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound { .. } | Error::SessionGone { .. } => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyExists { .. } => StatusCode::CONFLICT,
            Error::Spawn(_) | Error::InvalidConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(json!({"error": self.0.to_string(), "code": self.0.code()})),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sessions", get(list_sessions_handler))
        // Recording
        .route(
            "/api/recordings",
            get(list_recordings_handler).post(start_recording_handler),
        )
        .route("/api/recordings/:id", get(recording_status_handler))
        .route("/api/recordings/:id/save", post(save_recording_handler))
        .route("/api/recordings/:id/stop", post(stop_recording_handler))
        // Replay
        .route("/api/replay", post(replay_handler))
        // Test cases
        .route("/api/tests", get(list_tests_handler).post(create_test_handler))
        .route(
            "/api/tests/:id",
            get(get_test_handler).delete(delete_test_handler),
        )
        .route("/api/tests/:id/run", post(run_test_handler))
        // AI
        .route("/api/ai/analyze", post(ai_analyze_handler))
        .route("/api/ai/generate", post(ai_generate_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve the API until the listener fails
pub async fn serve(ctx: AppContext, addr: SocketAddr) -> anyhow::Result<()> {
    info!("HTTP API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(ctx)).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": recplay_common::VERSION,
        "sessions": ctx.registry.len(),
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "no such route", "code": "not_found"})),
    )
}

async fn list_sessions_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    let sessions = ctx.registry.list();
    Json(json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

async fn start_recording_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<StartRecordingRequest>,
) -> ApiResult<impl IntoResponse> {
    let session_id = ctx.recorder.start(&req.url, &req.test_name).await?;
    Ok((StatusCode::CREATED, Json(StartRecordingResponse { session_id })))
}

async fn list_recordings_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    let recordings = ctx.recorder.list().await;
    Json(json!({
        "count": recordings.len(),
        "recordings": recordings,
    }))
}

async fn recording_status_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ctx.recorder.status(&id).await?))
}

async fn save_recording_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    body: Option<Json<SaveRecordingRequest>>,
) -> ApiResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let test = ctx.recorder.save(&id, req.test_name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn stop_recording_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    ctx.recorder.stop(&id).await?;
    Ok(Json(json!({"session_id": id, "stopped": true})))
}

async fn replay_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<ReplayRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ctx.replay.run(&req).await?))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn list_tests_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let tests = ctx.store.search(params.q.as_deref())?;
    Ok(Json(json!({
        "count": tests.len(),
        "tests": tests,
    })))
}

async fn create_test_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<NewTestCase>,
) -> ApiResult<impl IntoResponse> {
    let test = ctx.store.create(req)?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn get_test_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let test = ctx.store.get(&id)?.ok_or_else(|| Error::test_not_found(&id))?;
    Ok(Json(test))
}

async fn delete_test_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !ctx.store.delete(&id)? {
        return Err(Error::test_not_found(&id).into());
    }
    Ok(Json(json!({"id": id, "deleted": true})))
}

async fn run_test_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (test, result) = ctx.replay.run_test(&id).await?;
    Ok(Json(json!({
        "test": test,
        "result": result,
    })))
}

#[derive(Debug, Deserialize)]
struct AiBody {
    #[serde(default)]
    payload: Value,
}

async fn ai_analyze_handler(
    State(ctx): State<AppContext>,
    Json(body): Json<AiBody>,
) -> ApiResult<impl IntoResponse> {
    ai_call(&ctx, AiRequestKind::Analyze, body.payload).await
}

async fn ai_generate_handler(
    State(ctx): State<AppContext>,
    Json(body): Json<AiBody>,
) -> ApiResult<impl IntoResponse> {
    ai_call(&ctx, AiRequestKind::Generate, body.payload).await
}

async fn ai_call(ctx: &AppContext, kind: AiRequestKind, payload: Value) -> ApiResult<Json<Value>> {
    let response = ctx.gateway.call(&AiRequest { kind, payload }).await?;
    Ok(Json(serde_json::to_value(response).map_err(Error::from)?))
}
