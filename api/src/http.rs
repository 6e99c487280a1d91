use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat_pipeline::{AnswerPayload, Message};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub items: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        items: state.pipeline.item_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub context: Vec<Message>,
}

pub async fn query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Json<AnswerPayload> {
    Json(state.pipeline.respond(&payload.query, &payload.context))
}

fn mp3_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, "audio/mpeg")], body).into_response()
}

/// `POST /nrt`: whole utterance in (PCM16LE 16 kHz mono), spoken answer out (MP3).
pub async fn nrt(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return mp3_response(StatusCode::BAD_REQUEST, Vec::new());
    }

    let transcript = match state.stt.transcribe(&body).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("Transcription failed: {e:#}");
            return mp3_response(StatusCode::BAD_GATEWAY, Vec::new());
        }
    };
    let query = transcript.trim();
    if query.is_empty() {
        return mp3_response(StatusCode::BAD_REQUEST, Vec::new());
    }

    let response = state.pipeline.respond(query, &[]);
    log::debug!("nrt answered {query:?} (fallback={})", response.fallback);

    let mut audio = Vec::new();
    let mut chunks = state.tts.stream(&response.answer);
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => audio.extend_from_slice(&bytes),
            Err(e) => {
                log::error!("Speech synthesis failed: {e:#}");
                return mp3_response(StatusCode::BAD_GATEWAY, Vec::new());
            }
        }
    }

    mp3_response(StatusCode::OK, audio)
}
