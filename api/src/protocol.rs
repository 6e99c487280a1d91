//! Frames exchanged on the realtime socket.
//!
//! Binary frames carry PCM audio. Text frames carry JSON control messages:
//! `{"type":"flush"}` answers whatever audio (or `text`) has been collected,
//! `{"type":"text","text":"..."}` answers an already-transcribed query.
//! Text that is not a JSON object is taken as a plain query.

use chat_pipeline::{AnswerPayload, Message};
use serde::Serialize;
use serde_json::Value;

pub const NO_INPUT_WARNING: &str = "no speech or text";
pub const AUDIO_TOO_LONG_ERROR: &str = "audio buffer limit exceeded, utterance discarded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Flush { text: String },
    Text { text: String },
    Ignored,
}

pub fn parse_control_frame(raw: &str) -> ControlFrame {
    if raw.is_empty() {
        return ControlFrame::Ignored;
    }

    let payload = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            return ControlFrame::Text {
                text: raw.to_string(),
            }
        }
    };

    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match payload.get("type").and_then(Value::as_str) {
        Some("flush") => ControlFrame::Flush { text },
        Some("text") => ControlFrame::Text { text },
        _ => ControlFrame::Ignored,
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ServerNotice {
    Warning { warning: String },
    Error { error: String },
}

impl ServerNotice {
    pub fn no_input() -> Self {
        Self::Warning {
            warning: NO_INPUT_WARNING.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub fn answer_json(payload: &AnswerPayload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
}

/// Per-connection conversation state.
/// Outcome of buffering one binary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPush {
    Buffered,
    /// This chunk crossed the limit; the utterance so far was discarded.
    LimitReached,
    /// The utterance already overflowed; chunks are ignored until the next flush.
    Dropped,
}

#[derive(Debug, Default)]
pub struct Session {
    context: Vec<Message>,
    audio: Vec<u8>,
    overflowed: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &[Message] {
        &self.context
    }

    /// Appends a chunk unless that would take the buffer past `limit`.
    pub fn push_audio(&mut self, chunk: &[u8], limit: usize) -> AudioPush {
        if self.overflowed {
            return AudioPush::Dropped;
        }
        if self.audio.len() + chunk.len() > limit {
            self.audio = Vec::new();
            self.overflowed = true;
            return AudioPush::LimitReached;
        }
        self.audio.extend_from_slice(chunk);
        AudioPush::Buffered
    }

    pub fn buffered_audio(&self) -> usize {
        self.audio.len()
    }

    /// Hands over the collected audio, leaving the buffer empty and ready
    /// for the next utterance.
    pub fn take_audio(&mut self) -> Vec<u8> {
        self.overflowed = false;
        std::mem::take(&mut self.audio)
    }

    pub fn record_turn(&mut self, query: &str, answer: &str) {
        self.context.push(Message::user(query));
        self.context.push(Message::system(answer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flush_and_text() {
        assert_eq!(
            parse_control_frame(r#"{"type":"flush"}"#),
            ControlFrame::Flush {
                text: String::new()
            }
        );
        assert_eq!(
            parse_control_frame(r#"{"type":"flush","text":"开发票"}"#),
            ControlFrame::Flush {
                text: "开发票".into()
            }
        );
        assert_eq!(
            parse_control_frame(r#"{"type":"text","text":"开发票"}"#),
            ControlFrame::Text {
                text: "开发票".into()
            }
        );
    }

    #[test]
    fn non_json_is_plain_text() {
        assert_eq!(
            parse_control_frame("开发票"),
            ControlFrame::Text {
                text: "开发票".into()
            }
        );
        assert_eq!(
            parse_control_frame("42"),
            ControlFrame::Text { text: "42".into() }
        );
    }

    #[test]
    fn unknown_or_empty_is_ignored() {
        assert_eq!(parse_control_frame(""), ControlFrame::Ignored);
        assert_eq!(parse_control_frame(r#"{"type":"ping"}"#), ControlFrame::Ignored);
        assert_eq!(parse_control_frame("{}"), ControlFrame::Ignored);
    }

    #[test]
    fn notices_serialize_flat() {
        assert_eq!(
            ServerNotice::no_input().to_json(),
            r#"{"warning":"no speech or text"}"#
        );
        assert_eq!(ServerNotice::error("boom").to_json(), r#"{"error":"boom"}"#);
    }

    #[test]
    fn session_buffers_and_records() {
        let mut session = Session::new();
        session.push_audio(&[1, 2], 16);
        session.push_audio(&[3, 4], 16);
        assert_eq!(session.buffered_audio(), 4);
        assert_eq!(session.take_audio(), vec![1, 2, 3, 4]);
        assert_eq!(session.buffered_audio(), 0);

        session.record_turn("开发票", "可以");
        assert_eq!(
            session.context(),
            &[Message::user("开发票"), Message::system("可以")]
        );
    }

    #[test]
    fn audio_past_limit_is_discarded_until_flush() {
        let mut session = Session::new();
        assert_eq!(session.push_audio(&[0; 6], 8), AudioPush::Buffered);
        assert_eq!(session.push_audio(&[0; 4], 8), AudioPush::LimitReached);
        assert_eq!(session.buffered_audio(), 0);
        assert_eq!(session.push_audio(&[0; 2], 8), AudioPush::Dropped);
        assert_eq!(session.buffered_audio(), 0);

        assert!(session.take_audio().is_empty());
        assert_eq!(session.push_audio(&[0; 8], 8), AudioPush::Buffered);
        assert_eq!(session.buffered_audio(), 8);
    }
}
