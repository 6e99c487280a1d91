pub mod answerer;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gate;
pub mod guardrails;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod rerank;
pub mod retrieval;
pub mod text;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use loader::{load_qa_pairs, write_jsonl};
pub use models::*;
pub use pipeline::ChatPipeline;
