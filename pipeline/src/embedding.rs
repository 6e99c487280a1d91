use std::collections::{HashMap, HashSet};

use crate::text::{normalize_text, tokenize};

const MAX_VOCABULARY: usize = 1000;

/// Dense TF-IDF embeddings over the most frequent index terms.
#[derive(Debug)]
pub struct TfIdfEmbedder {
    vocabulary: HashMap<String, usize>,
    idf_scores: HashMap<String, f64>,
    embeddings: Vec<Vec<f64>>,
}

impl TfIdfEmbedder {
    /// Builds the vocabulary from already-tokenized documents and embeds each of them.
    pub fn fit(documents: &[Vec<String>]) -> Self {
        let mut word_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_frequencies: HashMap<&str, usize> = HashMap::new();
        let total_docs = documents.len();

        for tokens in documents {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for word in tokens {
                *word_counts.entry(word.as_str()).or_insert(0) += 1;
            }
            for word in unique {
                *doc_frequencies.entry(word).or_insert(0) += 1;
            }
        }

        let idf_scores: HashMap<String, f64> = doc_frequencies
            .iter()
            .map(|(word, df)| {
                let idf = (total_docs as f64 / *df as f64).ln();
                (word.to_string(), idf)
            })
            .collect();

        let mut word_freq_pairs: Vec<(&str, usize)> = word_counts.into_iter().collect();
        word_freq_pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let vocabulary: HashMap<String, usize> = word_freq_pairs
            .into_iter()
            .take(MAX_VOCABULARY)
            .enumerate()
            .map(|(idx, (word, _))| (word.to_string(), idx))
            .collect();

        let mut embedder = Self {
            vocabulary,
            idf_scores,
            embeddings: Vec::new(),
        };
        let embeddings = documents
            .iter()
            .map(|tokens| embedder.embed_tokens(tokens))
            .collect();
        embedder.embeddings = embeddings;

        log::debug!(
            "TF-IDF vocabulary has {} terms over {} documents",
            embedder.vocabulary.len(),
            total_docs
        );
        embedder
    }

    pub fn embed(&self, text: &str) -> Vec<f64> {
        self.embed_tokens(&tokenize(&normalize_text(text)))
    }

    fn embed_tokens(&self, tokens: &[String]) -> Vec<f64> {
        let mut embedding = vec![0.0; self.vocabulary.len()];
        if tokens.is_empty() {
            return embedding;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let total_words = tokens.len() as f64;
        for (word, count) in counts {
            if let Some(&idx) = self.vocabulary.get(word) {
                let tf = count as f64 / total_words;
                let idf = self.idf_scores.get(word).copied().unwrap_or(1.0);
                embedding[idx] = tf * idf;
            }
        }

        let norm: f64 = embedding.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }
        embedding
    }

    /// Cosine similarity of the query against every fitted document.
    pub fn score(&self, query: &str) -> Vec<f64> {
        let query_embedding = self.embed(query);
        self.embeddings
            .iter()
            .map(|doc| cosine_similarity(&query_embedding, doc))
            .collect()
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let min_len = a.len().min(b.len());
    let dot: f64 = a[..min_len].iter().zip(&b[..min_len]).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a[..min_len].iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b[..min_len].iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Vec<String>> {
        texts.iter().map(|t| tokenize(&normalize_text(t))).collect()
    }

    #[test]
    fn embeddings_are_unit_length() {
        let embedder = TfIdfEmbedder::fit(&docs(&["invoice request", "refund policy", "invoice"]));
        let v = embedder.embed("invoice request");
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_query_scores_zero() {
        let embedder = TfIdfEmbedder::fit(&docs(&["invoice", "refund"]));
        assert_eq!(embedder.score("shipping"), vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-12);
    }
}
