use std::path::Path;

use crate::answerer::build_answer;
use crate::cache::TtlCache;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::gate::passes_confidence_gate;
use crate::guardrails::apply_guardrails;
use crate::loader::load_qa_pairs;
use crate::models::{AnswerPayload, KnowledgeItem, Message, RetrievalCandidate};
use crate::rerank::rerank;
use crate::retrieval::Retriever;
use crate::text::{contains_referential, normalize_text};

/// Question answering over a fixed knowledge base of logged conversations.
///
/// One instance is shared by every connection; it holds no per-session state.
pub struct ChatPipeline {
    config: PipelineConfig,
    retriever: Retriever,
    answer_cache: TtlCache<AnswerPayload>,
    retrieval_cache: TtlCache<Vec<RetrievalCandidate>>,
}

impl ChatPipeline {
    pub fn new(config: PipelineConfig, items: Vec<KnowledgeItem>) -> Self {
        let hybrid = &config.retrieval.hybrid;
        let retriever = Retriever::new(
            items,
            hybrid.bm25_top_k,
            hybrid.vector_top_k,
            hybrid.vector_backend,
        );
        let cache_cfg = &config.cache;
        let answer_cache =
            TtlCache::with_ttl_secs(cache_cfg.answer_cache_ttl_sec, cache_cfg.max_entries);
        let retrieval_cache =
            TtlCache::with_ttl_secs(cache_cfg.retrieval_cache_ttl_sec, cache_cfg.max_entries);

        Self {
            config,
            retriever,
            answer_cache,
            retrieval_cache,
        }
    }

    /// Loads the config, then the knowledge file it (or `data_override`) names.
    pub fn from_config_file(
        config_path: impl AsRef<Path>,
        data_override: Option<&Path>,
    ) -> Result<Self> {
        let config = PipelineConfig::load(config_path)?;
        let data_path = match data_override {
            Some(path) => path.to_path_buf(),
            None if !config.retrieval.index_source.is_empty() => {
                config.retrieval.index_source.clone().into()
            }
            None => {
                return Err(PipelineError::config(
                    "No data source configured. Set retrieval.index_source or --data.",
                ))
            }
        };
        let items = load_qa_pairs(&data_path)?;
        Ok(Self::new(config, items))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn item_count(&self) -> usize {
        self.retriever.len()
    }

    /// Live entries in the answer and retrieval caches.
    pub fn cached_entries(&self) -> (u64, u64) {
        (
            self.answer_cache.entry_count(),
            self.retrieval_cache.entry_count(),
        )
    }

    fn refusal(&self) -> AnswerPayload {
        AnswerPayload::refusal(&self.config.llm.refuse_template)
    }

    /// Answers `query`, using earlier turns of the conversation when it looks like a follow-up.
    pub fn respond(&self, query: &str, context: &[Message]) -> AnswerPayload {
        let cfg = &self.config;
        let normalized = if cfg.input.normalize.trim_spaces {
            normalize_text(query)
        } else {
            query.to_string()
        };

        if let Some(refusal) = apply_guardrails(
            &normalized,
            &cfg.llm.refuse_template,
            &cfg.guardrails.sensitive_keywords,
            cfg.guardrails.out_of_scope_policy,
        ) {
            return refusal;
        }

        let context_messages = normalize_context(context);
        let ctx_cfg = &cfg.input.context;
        let combined_query = combine_query(
            &normalized,
            &context_messages,
            &ctx_cfg.referential_tokens,
            ctx_cfg.min_query_len_for_context,
            ctx_cfg.max_turns,
        );

        if let Some(cached) = self.answer_cache.get(&combined_query) {
            log::debug!("Answer cache hit for {combined_query:?}");
            return cached;
        }

        let candidates = match self.retrieval_cache.get(&combined_query) {
            Some(cached) => cached,
            None => {
                let fresh = self.retriever.retrieve(&combined_query);
                self.retrieval_cache.set(combined_query.clone(), fresh.clone());
                fresh
            }
        };
        if candidates.is_empty() {
            return self.refusal();
        }

        let weights = cfg.retrieval.hybrid.merge_weights;
        let mut reranked = rerank(
            candidates,
            weights.vector,
            weights.bm25,
            cfg.rerank.intent_boost,
        );
        reranked.truncate(cfg.rerank.top_k);

        let gate_cfg = &cfg.confidence_gate;
        let gate = passes_confidence_gate(
            &reranked,
            gate_cfg.min_confidence,
            gate_cfg.min_margin,
            gate_cfg.conflict_reject,
        );
        if !gate.passed {
            log::debug!(
                "Confidence gate rejected {combined_query:?} (top score {:.3})",
                gate.confidence
            );
            return self.refusal();
        }

        let mut response = build_answer(&reranked, &cfg.llm.refuse_template);
        response.confidence = gate.confidence;
        self.answer_cache.set(combined_query, response.clone());
        response
    }
}

fn normalize_context(context: &[Message]) -> Vec<Message> {
    context
        .iter()
        .filter(|m| !m.role.is_empty() && !m.text.is_empty())
        .cloned()
        .collect()
}

/// Prefixes short or referential queries with the most recent user turns.
pub fn combine_query(
    query: &str,
    context: &[Message],
    referential_tokens: &[String],
    min_len: usize,
    max_turns: usize,
) -> String {
    let use_context =
        query.chars().count() < min_len || contains_referential(query, referential_tokens);
    if context.is_empty() || !use_context {
        return query.to_string();
    }

    let user_texts: Vec<&str> = context
        .iter()
        .filter(|m| m.is_user())
        .map(|m| m.text.as_str())
        .collect();
    let tail = if max_turns > 0 && user_texts.len() > max_turns {
        &user_texts[user_texts.len() - max_turns..]
    } else {
        &user_texts[..]
    };
    if tail.is_empty() {
        return query.to_string();
    }

    let mut parts = tail.to_vec();
    parts.push(query);
    parts.join(" ")
}
