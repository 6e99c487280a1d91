//! Speech backends.
//!
//! Audio in is 16 kHz mono PCM16LE; audio out is MP3. Both directions talk to
//! OpenAI-compatible HTTP services (`/v1/audio/transcriptions`,
//! `/v1/audio/speech`) so any local whisper or TTS server can be plugged in.

use std::env;
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryFutureExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 16_000;

pub type AudioStream = BoxStream<'static, Result<Bytes>>;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes a complete utterance. Empty audio yields an empty transcript.
    async fn transcribe(&self, pcm: &[u8]) -> Result<String>;
}

pub trait TextToSpeech: Send + Sync {
    /// Streams synthesized MP3 chunks. Empty text yields an empty stream.
    fn stream(&self, text: &str) -> AudioStream;
}

/// Drops a dangling odd byte so the buffer is whole 16-bit samples.
pub fn whole_samples(pcm: &[u8]) -> &[u8] {
    if pcm.len() % 2 != 0 {
        log::warn!("PCM buffer has odd length {}, dropping last byte", pcm.len());
        &pcm[..pcm.len() - 1]
    } else {
        pcm
    }
}

pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in whole_samples(pcm).chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub asr_url: Option<String>,
    pub asr_model: String,
    pub asr_language: Option<String>,
    pub tts_url: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            asr_url: None,
            asr_model: "small".to_string(),
            asr_language: None,
            tts_url: None,
            tts_model: "tts-1".to_string(),
            tts_voice: "zh-CN-XiaoxiaoNeural".to_string(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl SpeechConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            asr_url: non_empty_var("ASR_URL"),
            asr_model: non_empty_var("ASR_MODEL").unwrap_or(defaults.asr_model),
            asr_language: non_empty_var("ASR_LANG"),
            tts_url: non_empty_var("TTS_URL"),
            tts_model: non_empty_var("TTS_MODEL").unwrap_or(defaults.tts_model),
            tts_voice: non_empty_var("TTS_VOICE").unwrap_or(defaults.tts_voice),
        }
    }

    /// Picks HTTP backends for whichever services have a URL configured.
    pub fn build(&self) -> (Arc<dyn SpeechToText>, Arc<dyn TextToSpeech>) {
        let client = Client::new();

        let stt: Arc<dyn SpeechToText> = match &self.asr_url {
            Some(url) => {
                log::info!("ASR backend: {url} (model {})", self.asr_model);
                Arc::new(HttpStt {
                    client: client.clone(),
                    base_url: url.trim_end_matches('/').to_string(),
                    model: self.asr_model.clone(),
                    language: self.asr_language.clone(),
                })
            }
            None => {
                log::warn!("ASR_URL not set; audio endpoints will reject speech input");
                Arc::new(DisabledStt)
            }
        };

        let tts: Arc<dyn TextToSpeech> = match &self.tts_url {
            Some(url) => {
                log::info!("TTS backend: {url} (voice {})", self.tts_voice);
                Arc::new(HttpTts {
                    client,
                    base_url: url.trim_end_matches('/').to_string(),
                    model: self.tts_model.clone(),
                    voice: self.tts_voice.clone(),
                })
            }
            None => {
                log::warn!("TTS_URL not set; answers will be sent without audio");
                Arc::new(SilentTts)
            }
        };

        (stt, tts)
    }
}

pub struct DisabledStt;

#[async_trait]
impl SpeechToText for DisabledStt {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String> {
        if whole_samples(pcm).is_empty() {
            return Ok(String::new());
        }
        Err(anyhow!("speech recognition is not configured (set ASR_URL)"))
    }
}

pub struct HttpStt {
    client: Client,
    base_url: String,
    model: String,
    language: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl SpeechToText for HttpStt {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String> {
        let pcm = whole_samples(pcm);
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let wav = pcm16_to_wav(pcm, SAMPLE_RATE)?;
        let file = Part::bytes(wav).file_name("audio.wav").mime_str("audio/wav")?;
        let mut form = Form::new().text("model", self.model.clone()).part("file", file);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("ASR request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("ASR backend error {status}: {error_text}"));
        }

        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text.trim().to_string())
    }
}

/// Produces no audio; clients still get the JSON answer.
pub struct SilentTts;

impl TextToSpeech for SilentTts {
    fn stream(&self, _text: &str) -> AudioStream {
        stream::empty().boxed()
    }
}

pub struct HttpTts {
    client: Client,
    base_url: String,
    model: String,
    voice: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl TextToSpeech for HttpTts {
    fn stream(&self, text: &str) -> AudioStream {
        if text.is_empty() {
            return stream::empty().boxed();
        }

        let request = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                response_format: "mp3",
            });

        async move {
            let response = request.send().await.context("TTS request failed")?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("TTS backend error {status}: {error_text}"));
            }
            Ok::<_, anyhow::Error>(response.bytes_stream().map_err(anyhow::Error::from))
        }
        .try_flatten_stream()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_wraps_samples() {
        let pcm: Vec<u8> = [1i16, -1, 300].iter().flat_map(|s| s.to_le_bytes()).collect();
        let wav = pcm16_to_wav(&pcm, SAMPLE_RATE).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -1, 300]);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        assert_eq!(whole_samples(&[1u8, 2, 3]), &[1u8, 2][..]);
        assert_eq!(whole_samples(&[1u8, 2]), &[1u8, 2][..]);
        assert!(whole_samples(&[]).is_empty());
    }

    #[tokio::test]
    async fn disabled_stt_accepts_silence_only() {
        assert_eq!(DisabledStt.transcribe(&[]).await.unwrap(), "");
        assert_eq!(DisabledStt.transcribe(&[7]).await.unwrap(), "");
        assert!(DisabledStt.transcribe(&[0, 0]).await.is_err());
    }

    #[tokio::test]
    async fn silent_tts_yields_nothing() {
        let chunks: Vec<_> = SilentTts.stream("你好").collect().await;
        assert!(chunks.is_empty());
    }

    #[test]
    fn default_voice() {
        let cfg = SpeechConfig::default();
        assert_eq!(cfg.tts_voice, "zh-CN-XiaoxiaoNeural");
        assert_eq!(cfg.asr_model, "small");
        assert!(cfg.asr_url.is_none());
    }
}
