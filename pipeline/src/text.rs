use regex::Regex;
use std::sync::OnceLock;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x{4e00}-\x{9fff}]+|[a-zA-Z0-9]+").expect("valid token regex"))
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Full-width spaces become ASCII, then trim, lowercase and collapse runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    let replaced = text.replace('\u{3000}', " ");
    let lowered = replaced.trim().to_lowercase();
    space_re().replace_all(&lowered, " ").into_owned()
}

/// Splits text into ASCII words and CJK character bigrams.
///
/// A lone CJK character is kept as a unigram so single-character queries
/// still have something to match on.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for m in token_re().find_iter(text) {
        let part = m.as_str();
        let starts_cjk = part.chars().next().map(is_cjk).unwrap_or(false);
        if starts_cjk {
            let chars: Vec<char> = part.chars().collect();
            if chars.len() == 1 {
                tokens.push(part.to_string());
            } else {
                tokens.extend(chars.windows(2).map(|w| w.iter().collect::<String>()));
            }
        } else {
            tokens.push(part.to_lowercase());
        }
    }
    tokens
}

pub fn contains_referential<S: AsRef<str>>(text: &str, tokens: &[S]) -> bool {
    tokens.iter().any(|t| text.contains(t.as_ref()))
}
