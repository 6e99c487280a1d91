use anyhow::{Context, Result};
use chat_pipeline::{load_qa_pairs, ChatPipeline, PipelineConfig};
use chatbot_api::speech::SpeechConfig;
use chatbot_api::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;

const DEFAULT_DATA_PATH: &str = "data/qa_pairs.jsonl";

/// Realtime chatbot server: WebSocket text and voice chat plus HTTP endpoints.
#[derive(Parser, Debug)]
#[command(name = "chatbot-server", version)]
struct Args {
    #[arg(long, env = "PIPELINE_CONFIG", default_value = "config/pipeline.json")]
    config: PathBuf,

    /// Overrides retrieval.index_source from the config.
    #[arg(long, env = "PIPELINE_DATA")]
    data: Option<PathBuf>,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:9000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let config = PipelineConfig::load(&args.config)?;
    let data_path = args.data.unwrap_or_else(|| {
        if config.retrieval.index_source.is_empty() {
            PathBuf::from(DEFAULT_DATA_PATH)
        } else {
            PathBuf::from(&config.retrieval.index_source)
        }
    });
    let items = load_qa_pairs(&data_path)
        .with_context(|| format!("Failed to load knowledge base {}", data_path.display()))?;
    let pipeline = ChatPipeline::new(config, items);
    log::info!("Chat pipeline ready with {} items", pipeline.item_count());

    let (stt, tts) = SpeechConfig::from_env().build();
    let api_token = std::env::var("API_TOKEN").ok().filter(|t| !t.is_empty());
    if api_token.is_some() {
        log::info!("Bearer token authentication enabled");
    }

    let app = build_router(AppState::new(pipeline, stt, tts), api_token);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Cannot bind {}", args.bind))?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
