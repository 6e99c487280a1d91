pub mod auth;
pub mod chat_ws;
pub mod http;
pub mod protocol;
pub mod realtime;
pub mod speech;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::AppState;

/// Default upper bound for one utterance: ten minutes of 16 kHz PCM16.
pub const MAX_AUDIO_BYTES: usize = 16_000 * 2 * 600;

/// Builds the full route table. With `api_token` set, everything but `/health`
/// requires `Authorization: Bearer <token>`.
pub fn build_router(state: AppState, api_token: Option<String>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_audio_bytes);
    let mut protected = Router::new()
        .route("/ws", get(chat_ws::ws_chat))
        .route("/ws/rt", get(realtime::ws_realtime))
        .route("/nrt", post(http::nrt).layer(body_limit))
        .route("/query", post(http::query));

    if let Some(token) = api_token {
        let expected: Arc<str> = Arc::from(token);
        protected = protected.route_layer(middleware::from_fn_with_state(
            expected,
            auth::require_bearer,
        ));
    }

    Router::new()
        .route("/health", get(http::health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
