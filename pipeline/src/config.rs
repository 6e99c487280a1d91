//! Pipeline configuration.
//!
//! Loaded from a `.json` or `.toml` file. Every field has a default so a
//! partial (or empty) file is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub confidence_gate: ConfidenceGateConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub guardrails: GuardrailsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub normalize: NormalizeConfig,
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub trim_spaces: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { trim_spaces: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Pronouns and the like that signal a follow-up question.
    pub referential_tokens: Vec<String>,
    /// Queries shorter than this (in characters) always pull in context.
    pub min_query_len_for_context: usize,
    /// How many previous user turns to merge; 0 means all of them.
    pub max_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            referential_tokens: Vec::new(),
            min_query_len_for_context: 6,
            max_turns: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Path of the JSONL knowledge file.
    pub index_source: String,
    pub hybrid: HybridConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Jaccard,
    Tfidf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub bm25_top_k: usize,
    pub vector_top_k: usize,
    pub vector_backend: VectorBackend,
    pub merge_weights: MergeWeights,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            bm25_top_k: 20,
            vector_top_k: 20,
            vector_backend: VectorBackend::default(),
            merge_weights: MergeWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeWeights {
    pub vector: f64,
    pub bm25: f64,
}

impl Default for MergeWeights {
    fn default() -> Self {
        Self {
            vector: 0.6,
            bm25: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub top_k: usize,
    pub intent_boost: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            intent_boost: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceGateConfig {
    pub min_confidence: f64,
    pub min_margin: f64,
    pub conflict_reject: bool,
}

impl Default for ConfidenceGateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.55,
            min_margin: 0.05,
            conflict_reject: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub answer_cache_ttl_sec: u64,
    pub retrieval_cache_ttl_sec: u64,
    /// Upper bound on entries per cache; least-valuable entries are evicted past it.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            answer_cache_ttl_sec: 900,
            retrieval_cache_ttl_sec: 900,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub refuse_template: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfScopePolicy {
    #[default]
    Refuse,
    Allow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailsConfig {
    pub sensitive_keywords: Vec<String>,
    pub out_of_scope_policy: OutOfScopePolicy,
}

impl PipelineConfig {
    /// Load a config file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let raw = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = match extension.as_str() {
            "json" => serde_json::from_str(&raw)
                .map_err(|e| PipelineError::config(format!("{}: {e}", path.display())))?,
            "toml" => toml::from_str(&raw)
                .map_err(|e| PipelineError::config(format!("{}: {e}", path.display())))?,
            other => {
                return Err(PipelineError::config(format!(
                    "Unsupported config format: .{other}"
                )))
            }
        };

        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.input.normalize.trim_spaces);
        assert_eq!(cfg.input.context.min_query_len_for_context, 6);
        assert_eq!(cfg.input.context.max_turns, 4);
        assert_eq!(cfg.retrieval.hybrid.bm25_top_k, 20);
        assert_eq!(cfg.retrieval.hybrid.vector_backend, VectorBackend::Jaccard);
        assert_eq!(cfg.retrieval.hybrid.merge_weights.vector, 0.6);
        assert_eq!(cfg.rerank.top_k, 5);
        assert_eq!(cfg.confidence_gate.min_confidence, 0.55);
        assert!(cfg.confidence_gate.conflict_reject);
        assert_eq!(cfg.cache.answer_cache_ttl_sec, 900);
        assert_eq!(cfg.cache.max_entries, 10_000);
        assert_eq!(cfg.guardrails.out_of_scope_policy, OutOfScopePolicy::Refuse);
    }

    #[test]
    fn partial_sections_keep_sibling_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"retrieval": {"hybrid": {"merge_weights": {"bm25": 0.7}}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.retrieval.hybrid.merge_weights.bm25, 0.7);
        assert_eq!(cfg.retrieval.hybrid.merge_weights.vector, 0.6);
        assert_eq!(cfg.retrieval.hybrid.vector_top_k, 20);
    }

    #[test]
    fn loads_toml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[rerank]\ntop_k = 3\n\n[retrieval.hybrid]\nvector_backend = \"tfidf\""
        )
        .unwrap();
        let cfg = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(cfg.rerank.top_k, 3);
        assert_eq!(cfg.retrieval.hybrid.vector_backend, VectorBackend::Tfidf);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = PipelineConfig::load("/nonexistent/pipeline.json").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
