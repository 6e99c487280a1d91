use crate::models::{AnswerPayload, RetrievalCandidate};

/// Formats the top-ranked candidate as the reply, or refuses when there is none.
pub fn build_answer(candidates: &[RetrievalCandidate], refuse_template: &str) -> AnswerPayload {
    let Some(top) = candidates.first() else {
        return AnswerPayload::refusal(refuse_template);
    };

    AnswerPayload {
        answer: format!("答复：{0}\n依据：{0}\n生效时间：", top.answer),
        citations: vec![top.id.clone()],
        confidence: top.scores.final_score,
        fallback: false,
    }
}
