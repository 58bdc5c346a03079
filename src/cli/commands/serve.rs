//! HTTP API server for the chat front-end.
//!
//! Provides REST endpoints for questions, transcripts, languages and cache
//! administration.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::{AnswerStatus, Engine, QuestionAnswer};
use crate::error::SporError;
use crate::rag::{ChatMessage, SourceRef};
use crate::retrieval::RetrievalMethod;
use crate::transcript::{is_english, LanguageOption, Transcript, ENGLISH};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// Shared application state.
struct AppState {
    engine: Engine,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let engine = Engine::new(settings)?;
    let app = router(Arc::new(AppState { engine }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    Output::header("Spor API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Ask", "POST   /api/chat/message");
    Output::kv("Transcript", "POST   /api/transcript/extract");
    Output::kv("Languages", "GET    /api/transcript/languages/:video_id");
    Output::kv("Purge video", "DELETE /api/admin/cache/:video_id");
    Output::kv("Purge expired", "POST   /api/admin/cleanup-expired");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat/message", post(chat_message))
        .route("/api/transcript/extract", post(extract_transcript))
        .route("/api/transcript/languages/{video_id}", get(languages))
        .route("/api/admin/cache/{video_id}", delete(purge_video))
        .route("/api/admin/cleanup-expired", post(cleanup_expired))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    video_id: String,
    question: String,
    #[serde(default)]
    chat_history: Vec<ChatMessage>,
    #[serde(default = "default_language")]
    language: String,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Serialize)]
struct ChatResponse {
    success: bool,
    response: String,
    cached: bool,
    status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<RetrievalMethod>,
    escalated: bool,
    sources: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<QuestionAnswer> for ChatResponse {
    fn from(answer: QuestionAnswer) -> Self {
        let success = answer.status == AnswerStatus::Answered;
        Self {
            success,
            response: answer.answer,
            cached: answer.cached,
            status: answer.status,
            method: answer.method,
            escalated: answer.escalated,
            sources: answer.sources,
            error: (!success).then(|| "generation_failed".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ExtractRequest {
    /// YouTube URL or video ID
    video: String,
    #[serde(default)]
    languages: Vec<String>,
}

#[derive(Serialize)]
struct ExtractResponse {
    video_id: String,
    language: String,
    is_generated: bool,
    full_text: String,
    transcript: Transcript,
}

#[derive(Serialize)]
struct LanguagesResponse {
    video_id: String,
    languages: Vec<LanguageOption>,
}

#[derive(Serialize)]
struct PurgeResponse {
    deleted: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

fn status_for(error: &SporError) -> StatusCode {
    match error {
        SporError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SporError::NoCaptions(_) => StatusCode::NOT_FOUND,
        SporError::Blocked(_) | SporError::TransientSource(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: SporError) -> Response {
    let status = status_for(&error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    match state
        .engine
        .answer_question(&req.video_id, &req.question, &req.chat_history, &req.language)
        .await
    {
        Ok(answer) => Json(ChatResponse::from(answer)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn extract_transcript(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> Response {
    let video_id = match state.engine.video_id(&req.video) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.engine.resolve_transcript(&video_id, &req.languages).await {
        Ok(transcript) => {
            if !is_english(transcript.language()) {
                spawn_translation(state.clone(), video_id.clone());
            }
            Json(ExtractResponse {
                video_id,
                language: transcript.language().to_string(),
                is_generated: transcript.is_generated(),
                full_text: transcript.full_text(),
                transcript,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Warm the English translation so the first question does not wait for it.
fn spawn_translation(state: Arc<AppState>, video_id: String) {
    tokio::spawn(async move {
        match state
            .engine
            .resolve_transcript(&video_id, &[ENGLISH.to_string()])
            .await
        {
            Ok(_) => debug!("English transcript ready for {}", video_id),
            Err(e) => warn!("Background translation of {} failed: {}", video_id, e),
        }
    });
}

async fn languages(State(state): State<Arc<AppState>>, Path(video_id): Path<String>) -> Response {
    match state.engine.available_languages(&video_id).await {
        Ok(languages) => Json(LanguagesResponse {
            video_id,
            languages,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn purge_video(State(state): State<Arc<AppState>>, Path(video_id): Path<String>) -> Response {
    match state.engine.purge_video(&video_id).await {
        Ok(deleted) => Json(PurgeResponse { deleted }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn cleanup_expired(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.purge_expired().await {
        Ok(deleted) => Json(PurgeResponse { deleted }).into_response(),
        Err(e) => error_response(e),
    }
}
