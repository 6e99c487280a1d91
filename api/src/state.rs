use std::sync::Arc;

use chat_pipeline::ChatPipeline;

use crate::speech::{SpeechToText, TextToSpeech};
use crate::MAX_AUDIO_BYTES;

/// Everything a request handler needs, cheap to clone per connection.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    /// Largest utterance accepted on `/nrt` or buffered on `/ws/rt`.
    pub max_audio_bytes: usize,
}

impl AppState {
    pub fn new(
        pipeline: ChatPipeline,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            stt,
            tts,
            max_audio_bytes: MAX_AUDIO_BYTES,
        }
    }

    pub fn with_max_audio_bytes(mut self, max_audio_bytes: usize) -> Self {
        self.max_audio_bytes = max_audio_bytes;
        self
    }
}
