#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chat_pipeline::{ChatPipeline, KnowledgeItem, PipelineConfig};
use chatbot_api::speech::{AudioStream, SpeechToText, TextToSpeech};
use chatbot_api::AppState;
use futures_util::stream::{self, StreamExt};

pub const REFUSE: &str = "抱歉，这个问题我暂时无法回答。";

/// Treats the "audio" bytes as UTF-8 text so tests can speak in strings.
pub struct EchoStt;

#[async_trait]
impl SpeechToText for EchoStt {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(pcm).trim().to_string())
    }
}

pub struct FailingStt;

#[async_trait]
impl SpeechToText for FailingStt {
    async fn transcribe(&self, _pcm: &[u8]) -> Result<String> {
        Err(anyhow!("backend offline"))
    }
}

/// Emits a fixed marker chunk followed by the text itself.
pub struct TaggedTts;

impl TextToSpeech for TaggedTts {
    fn stream(&self, text: &str) -> AudioStream {
        if text.is_empty() {
            return stream::empty().boxed();
        }
        let chunks = vec![
            Ok(Bytes::from_static(b"MP3:")),
            Ok(Bytes::from(text.to_string())),
        ];
        stream::iter(chunks).boxed()
    }
}

pub fn knowledge_base() -> Vec<KnowledgeItem> {
    vec![
        KnowledgeItem {
            id: "1#t2".into(),
            query: "怎么开发票".into(),
            answer: "在订单页申请开票".into(),
            intent: Some("invoice".into()),
            context: vec![],
        },
        KnowledgeItem {
            id: "3#t2".into(),
            query: "会员卡怎么办理".into(),
            answer: "前台即可办理".into(),
            intent: Some("member".into()),
            context: vec![],
        },
    ]
}

pub fn pipeline() -> ChatPipeline {
    let mut config = PipelineConfig::default();
    config.llm.refuse_template = REFUSE.to_string();
    ChatPipeline::new(config, knowledge_base())
}

pub fn state() -> AppState {
    AppState::new(pipeline(), Arc::new(EchoStt), Arc::new(TaggedTts))
}

pub fn state_with_stt(stt: Arc<dyn SpeechToText>) -> AppState {
    AppState::new(pipeline(), stt, Arc::new(TaggedTts))
}

pub const INVOICE_ANSWER: &str = "答复：在订单页申请开票\n依据：在订单页申请开票\n生效时间：";
