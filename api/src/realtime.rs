//! `/ws/rt`: voice conversation. Audio is buffered until a flush, then
//! transcribed, answered as JSON and spoken back as binary MP3 frames.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::protocol::{
    answer_json, parse_control_frame, AudioPush, ControlFrame, ServerNotice, Session,
    AUDIO_TOO_LONG_ERROR,
};
use crate::state::AppState;

pub async fn ws_realtime(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| realtime_session(socket, state))
}

/// Socket closed by the peer while we were still sending.
struct Disconnected;

async fn realtime_session(mut socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    log::info!("Realtime session {session_id} opened");
    let mut session = Session::new();

    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Realtime session {session_id} receive error: {e}");
                break;
            }
        };

        let outcome = match frame {
            WsMessage::Binary(chunk) => {
                match session.push_audio(&chunk, state.max_audio_bytes) {
                    AudioPush::LimitReached => {
                        log::warn!(
                            "Realtime session {session_id} exceeded {} buffered audio bytes",
                            state.max_audio_bytes
                        );
                        send_text(&mut socket, ServerNotice::error(AUDIO_TOO_LONG_ERROR).to_json())
                            .await
                    }
                    AudioPush::Buffered | AudioPush::Dropped => Ok(()),
                }
            }
            WsMessage::Text(raw) => match parse_control_frame(&raw) {
                ControlFrame::Flush { text } => flush(&mut socket, &state, &mut session, text).await,
                ControlFrame::Text { text } => {
                    let query = text.trim();
                    if query.is_empty() {
                        Ok(())
                    } else {
                        answer(&mut socket, &state, &mut session, query).await
                    }
                }
                ControlFrame::Ignored => Ok(()),
            },
            WsMessage::Close(_) => break,
            _ => Ok(()),
        };

        if outcome.is_err() {
            break;
        }
    }

    log::info!("Realtime session {session_id} closed");
}

async fn send_text(socket: &mut WebSocket, text: String) -> Result<(), Disconnected> {
    socket
        .send(WsMessage::Text(text))
        .await
        .map_err(|_| Disconnected)
}

async fn flush(
    socket: &mut WebSocket,
    state: &AppState,
    session: &mut Session,
    fallback_text: String,
) -> Result<(), Disconnected> {
    let audio = session.take_audio();
    let transcript = if audio.is_empty() {
        fallback_text
    } else {
        match state.stt.transcribe(&audio).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Transcription failed: {e:#}");
                return send_text(socket, ServerNotice::error(e.to_string()).to_json()).await;
            }
        }
    };

    let query = transcript.trim();
    if query.is_empty() {
        return send_text(socket, ServerNotice::no_input().to_json()).await;
    }
    answer(socket, state, session, query).await
}

async fn answer(
    socket: &mut WebSocket,
    state: &AppState,
    session: &mut Session,
    query: &str,
) -> Result<(), Disconnected> {
    let response = state.pipeline.respond(query, session.context());
    send_text(socket, answer_json(&response)).await?;

    let mut audio = state.tts.stream(&response.answer);
    while let Some(chunk) = audio.next().await {
        match chunk {
            Ok(bytes) => socket
                .send(WsMessage::Binary(bytes.to_vec()))
                .await
                .map_err(|_| Disconnected)?,
            Err(e) => {
                log::error!("Speech synthesis failed: {e:#}");
                break;
            }
        }
    }

    session.record_turn(query, &response.answer);
    Ok(())
}
