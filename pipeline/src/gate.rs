use crate::models::RetrievalCandidate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOutcome {
    pub passed: bool,
    /// Final score of the top candidate, 0 when there is none.
    pub confidence: f64,
}

/// Decides whether the best candidate is trustworthy enough to answer with.
///
/// A narrow lead over the runner-up only rejects when the two disagree on intent.
pub fn passes_confidence_gate(
    candidates: &[RetrievalCandidate],
    min_confidence: f64,
    min_margin: f64,
    conflict_reject: bool,
) -> GateOutcome {
    let Some(top1) = candidates.first() else {
        return GateOutcome {
            passed: false,
            confidence: 0.0,
        };
    };

    let top1_score = top1.scores.final_score;
    let reject = GateOutcome {
        passed: false,
        confidence: top1_score,
    };
    if top1_score < min_confidence {
        return reject;
    }

    if let Some(top2) = candidates.get(1) {
        if top1_score - top2.scores.final_score < min_margin && conflict_reject {
            if let (Some(a), Some(b)) = (top1.labelled_intent(), top2.labelled_intent()) {
                if a != b {
                    return reject;
                }
            }
        }
    }

    GateOutcome {
        passed: true,
        confidence: top1_score,
    }
}
