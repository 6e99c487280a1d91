use crate::config::OutOfScopePolicy;
use crate::models::AnswerPayload;

/// Returns a refusal for sensitive or empty queries, `None` to continue.
pub fn apply_guardrails<S: AsRef<str>>(
    query: &str,
    refuse_template: &str,
    sensitive_keywords: &[S],
    out_of_scope_policy: OutOfScopePolicy,
) -> Option<AnswerPayload> {
    let hit = sensitive_keywords
        .iter()
        .map(|kw| kw.as_ref())
        .find(|kw| !kw.is_empty() && query.contains(*kw));
    if let Some(keyword) = hit {
        log::debug!("Query refused on sensitive keyword {keyword:?}");
        return Some(AnswerPayload::refusal(refuse_template));
    }

    if out_of_scope_policy == OutOfScopePolicy::Refuse && query.trim().is_empty() {
        return Some(AnswerPayload::refusal(refuse_template));
    }

    None
}
