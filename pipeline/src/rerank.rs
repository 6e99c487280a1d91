use crate::models::RetrievalCandidate;

/// Blends normalized BM25 with the vector score and sorts best-first.
///
/// BM25 is divided by the batch maximum so both signals live in `[0, 1]`.
pub fn rerank(
    mut candidates: Vec<RetrievalCandidate>,
    weight_vector: f64,
    weight_bm25: f64,
    intent_boost: f64,
) -> Vec<RetrievalCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let max_bm25 = candidates
        .iter()
        .map(|c| c.scores.bm25)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_bm25 = if max_bm25 == 0.0 { 1.0 } else { max_bm25 };

    for cand in candidates.iter_mut() {
        let bm25_norm = cand.scores.bm25 / max_bm25;
        let intent_score = if cand.labelled_intent().is_some() {
            intent_boost
        } else {
            0.0
        };
        cand.scores.final_score =
            weight_vector * cand.scores.vector + weight_bm25 * bm25_norm + intent_score;
    }

    candidates.sort_by(|a, b| {
        b.scores
            .final_score
            .partial_cmp(&a.scores.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}
