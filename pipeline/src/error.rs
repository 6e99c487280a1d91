//! Error types for the chat pipeline library.
//!
//! Binaries wrap these with `anyhow` for context.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("QA data not found: {}", .0.display())]
    DataNotFound(PathBuf),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path:?} at line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("spreadsheet error in {path:?}: {message}")]
    Spreadsheet { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
