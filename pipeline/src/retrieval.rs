use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::VectorBackend;
use crate::embedding::TfIdfEmbedder;
use crate::models::{KnowledgeItem, RetrievalCandidate, Scores};
use crate::text::{normalize_text, tokenize};

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// Okapi BM25 over a fixed document set.
#[derive(Debug)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    doc_len: Vec<usize>,
    avgdl: f64,
    postings: HashMap<String, Vec<(usize, usize)>>,
    idf: HashMap<String, f64>,
    doc_tokens: Vec<Vec<String>>,
}

impl Bm25Index {
    pub fn new<S: AsRef<str>>(documents: &[S]) -> Self {
        Self::with_params(documents, BM25_K1, BM25_B)
    }

    pub fn with_params<S: AsRef<str>>(documents: &[S], k1: f64, b: f64) -> Self {
        let mut doc_len = Vec::with_capacity(documents.len());
        let mut doc_tokens = Vec::with_capacity(documents.len());
        let mut postings: HashMap<String, Vec<(usize, usize)>> = HashMap::new();

        for (idx, doc) in documents.iter().enumerate() {
            let tokens = tokenize(&normalize_text(doc.as_ref()));
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, freq) in tf {
                postings.entry(term.to_string()).or_default().push((idx, freq));
            }
            doc_len.push(tokens.len());
            doc_tokens.push(tokens);
        }

        let total_docs = documents.len();
        let avgdl = if total_docs > 0 {
            doc_len.iter().sum::<usize>() as f64 / total_docs as f64
        } else {
            0.0
        };

        let idf = postings
            .iter()
            .map(|(term, posting)| {
                let df = posting.len() as f64;
                let idf = ((total_docs as f64 - df + 0.5) / (df + 0.5) + 1.0).ln();
                (term.clone(), idf)
            })
            .collect();

        Self {
            k1,
            b,
            doc_len,
            avgdl,
            postings,
            idf,
            doc_tokens,
        }
    }

    /// One score per indexed document, in index order.
    pub fn score(&self, query: &str) -> Vec<f64> {
        let mut scores = vec![0.0; self.doc_tokens.len()];
        let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };

        for term in tokenize(&normalize_text(query)) {
            let Some(posting) = self.postings.get(&term) else {
                continue;
            };
            let idf = self.idf.get(&term).copied().unwrap_or(0.0);
            for &(doc_idx, freq) in posting {
                let freq = freq as f64;
                let dl = self.doc_len[doc_idx] as f64;
                let denom = freq + self.k1 * (1.0 - self.b + self.b * dl / avgdl);
                scores[doc_idx] += idf * (freq * (self.k1 + 1.0)) / denom;
            }
        }
        scores
    }

    pub fn token_sets(&self) -> Vec<HashSet<String>> {
        self.doc_tokens
            .iter()
            .map(|tokens| tokens.iter().cloned().collect())
            .collect()
    }

    pub fn doc_tokens(&self) -> &[Vec<String>] {
        &self.doc_tokens
    }

    pub fn len(&self) -> usize {
        self.doc_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_tokens.is_empty()
    }
}

enum VectorIndex {
    Jaccard(Vec<HashSet<String>>),
    Tfidf(TfIdfEmbedder),
}

impl VectorIndex {
    fn score(&self, query: &str) -> Vec<f64> {
        match self {
            VectorIndex::Jaccard(token_sets) => {
                let query_tokens: HashSet<String> =
                    tokenize(&normalize_text(query)).into_iter().collect();
                token_sets
                    .iter()
                    .map(|doc| jaccard(&query_tokens, doc))
                    .collect()
            }
            VectorIndex::Tfidf(embedder) => embedder.score(query),
        }
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Indices of the `k` highest scores; equal scores keep index order.
fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(k);
    order
}

/// The text a knowledge item is indexed under: prior user turns, then the query.
pub fn build_retrieval_text(item: &KnowledgeItem) -> String {
    let mut parts: Vec<&str> = item
        .context
        .iter()
        .filter(|m| m.is_user())
        .map(|m| m.text.as_str())
        .collect();
    parts.push(&item.query);
    parts.join(" ")
}

/// Hybrid lexical + vector retriever over the knowledge base.
pub struct Retriever {
    items: Vec<KnowledgeItem>,
    bm25_top_k: usize,
    vector_top_k: usize,
    bm25: Bm25Index,
    vectors: VectorIndex,
}

impl Retriever {
    pub fn new(
        items: Vec<KnowledgeItem>,
        bm25_top_k: usize,
        vector_top_k: usize,
        backend: VectorBackend,
    ) -> Self {
        let texts: Vec<String> = items.iter().map(build_retrieval_text).collect();
        let bm25 = Bm25Index::new(&texts);
        let vectors = match backend {
            VectorBackend::Jaccard => VectorIndex::Jaccard(bm25.token_sets()),
            VectorBackend::Tfidf => VectorIndex::Tfidf(TfIdfEmbedder::fit(bm25.doc_tokens())),
        };
        log::info!(
            "Built retrieval index over {} items ({:?} vectors)",
            items.len(),
            backend
        );

        Self {
            items,
            bm25_top_k,
            vector_top_k,
            bm25,
            vectors,
        }
    }

    pub fn retrieve(&self, query: &str) -> Vec<RetrievalCandidate> {
        let bm25_scores = self.bm25.score(query);
        let vector_scores = self.vectors.score(query);

        let merged: BTreeSet<usize> = top_k_indices(&bm25_scores, self.bm25_top_k)
            .into_iter()
            .chain(top_k_indices(&vector_scores, self.vector_top_k))
            .collect();

        merged
            .into_iter()
            .map(|idx| {
                let item = &self.items[idx];
                RetrievalCandidate {
                    id: item.id.clone(),
                    answer: item.answer.clone(),
                    intent: item.intent.clone(),
                    scores: Scores {
                        bm25: bm25_scores[idx],
                        vector: vector_scores[idx],
                        final_score: 0.0,
                    },
                }
            })
            .collect()
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
