//! `/ws`: text chat. Every text frame is one query, every reply one JSON answer.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::protocol::{answer_json, Session};
use crate::state::AppState;

pub async fn ws_chat(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| chat_session(socket, state))
}

async fn chat_session(mut socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    log::info!("Chat session {session_id} opened");
    let mut session = Session::new();

    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Chat session {session_id} receive error: {e}");
                break;
            }
        };

        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let query = text.trim();
        if query.is_empty() {
            continue;
        }

        let response = state.pipeline.respond(query, session.context());
        if socket
            .send(WsMessage::Text(answer_json(&response)))
            .await
            .is_err()
        {
            break;
        }
        session.record_turn(query, &response.answer);
    }

    log::info!("Chat session {session_id} closed");
}
