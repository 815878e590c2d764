//! HTTP API server for integration with other systems.
//!
//! Uploads are accepted as multipart bodies and processed in the background;
//! callers poll the job endpoints and query the index once a job is indexed.
//! An upload may carry a `model` field, and a reprocess a `?model=` query, to
//! pick the transcription model.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, TranscriptRecord, VideoJob};
use crate::vector_store::{IndexedVideo, QueryFilter, QueryResult};
use crate::VidscribeError;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

type SharedState = Arc<AppState>;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let max_upload_bytes = settings.server.max_upload_mb.saturating_mul(1024 * 1024);

    // Uploads fail later without these, but search and browsing still work
    if let Err(e) = preflight::check(Operation::Transcribe, &settings) {
        Output::warning(&format!("{}", e));
        Output::info("Run 'vidscribe doctor' for detailed diagnostics.");
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let app = router(orchestrator.clone(), max_upload_bytes);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("vidscribe API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Upload", "POST   /transcripts");
    Output::kv("List", "GET    /transcripts");
    Output::kv("Transcript", "GET    /transcripts/{video_id}");
    Output::kv("Delete", "DELETE /transcripts/{video_id}");
    Output::kv("Reprocess", "POST   /transcripts/{video_id}/reprocess[?model=]");
    Output::kv("Jobs", "GET    /jobs");
    Output::kv("Job", "GET    /jobs/{job_id}");
    Output::kv("Cancel", "POST   /jobs/{job_id}/cancel");
    Output::kv("Search", "POST   /search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for running jobs");
    orchestrator.shutdown().await?;

    Ok(())
}

fn router(orchestrator: Orchestrator, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/transcripts", post(upload).get(list_transcripts))
        .route("/transcripts/{video_id}", get(get_transcript).delete(delete_transcript))
        .route("/transcripts/{video_id}/reprocess", post(reprocess))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
        .route("/jobs/{job_id}/cancel", post(cancel_job))
        .route("/search", post(search))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// === Errors ===

#[derive(Debug)]
struct ApiError(VidscribeError);

impl From<VidscribeError> for ApiError {
    fn from(e: VidscribeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VidscribeError::JobNotFound(_) => StatusCode::NOT_FOUND,
            VidscribeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

fn not_found(what: String) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: what })).into_response()
}

// === Request/Response Types ===

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    job_id: Uuid,
    video_id: String,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default = "default_page_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_page_limit() -> usize {
    50
}

#[derive(Deserialize, Default)]
struct ModelParam {
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
struct TranscriptListResponse {
    transcripts: Vec<IndexedVideo>,
    limit: usize,
    offset: usize,
}

#[derive(Serialize)]
struct DeleteResponse {
    video_id: String,
    chunks_deleted: usize,
}

#[derive(Serialize)]
struct JobListResponse {
    jobs: Vec<VideoJob>,
}

#[derive(Serialize)]
struct CancelResponse {
    job_id: Uuid,
    cancelled: bool,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    min_score: Option<f32>,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<QueryResult>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mut file = None;
    let mut model = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VidscribeError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| VidscribeError::InvalidInput(format!("failed to read upload: {}", e)))?;
                file = Some((file_name, bytes));
            }
            Some("model") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| VidscribeError::InvalidInput(format!("failed to read model: {}", e)))?;
                model = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| VidscribeError::InvalidInput("multipart field 'file' is required".to_string()))?;

    let job_id = state
        .orchestrator
        .submit_upload(&file_name, &bytes, model.as_deref())
        .await?;
    let job = state.orchestrator.get_job(job_id)?;
    info!("Accepted upload {} as job {} ({})", file_name, job_id, job.model);

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            video_id: job.video_id,
        }),
    ))
}

async fn list_transcripts(
    State(state): State<SharedState>,
    Query(page): Query<Page>,
) -> Result<Json<TranscriptListResponse>, ApiError> {
    let transcripts = state.orchestrator.list_transcripts(page.limit, page.offset).await?;
    Ok(Json(TranscriptListResponse {
        transcripts,
        limit: page.limit,
        offset: page.offset,
    }))
}

async fn get_transcript(
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
) -> Result<Response, ApiError> {
    let record: Option<TranscriptRecord> = state.orchestrator.get_transcript(&video_id).await?;
    Ok(match record {
        Some(record) => Json(record).into_response(),
        None => not_found(format!("Transcript not found: {}", video_id)),
    })
}

async fn delete_transcript(
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let chunks_deleted = state.orchestrator.delete_transcript(&video_id).await?;
    Ok(Json(DeleteResponse {
        video_id,
        chunks_deleted,
    }))
}

async fn reprocess(
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
    Query(params): Query<ModelParam>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let job_id = state.orchestrator.reprocess(&video_id, params.model.as_deref()).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id, video_id })))
}

async fn list_jobs(State(state): State<SharedState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.orchestrator.list_jobs(),
    })
}

async fn get_job(
    State(state): State<SharedState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<VideoJob>, ApiError> {
    Ok(Json(state.orchestrator.get_job(job_id)?))
}

async fn cancel_job(
    State(state): State<SharedState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.orchestrator.cancel(job_id)?;
    Ok(Json(CancelResponse { job_id, cancelled }))
}

async fn search(
    State(state): State<SharedState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let filter = QueryFilter {
        video_id: req.video_id,
        min_score: req.min_score,
    };
    let results = state
        .orchestrator
        .search_filtered(&req.query, req.top_k, &filter)
        .await?;
    Ok(Json(SearchResponse { results }))
}
