use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::stopwords::is_stop_word;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token regex"));

/// NFKC-folds and lowercases `text`, dropping control characters other than
/// whitespace.
pub fn normalize_text(text: &str) -> String {
    let nfkc = text.nfkc().collect::<String>();
    let mut result = String::with_capacity(nfkc.len());
    for ch in nfkc.chars() {
        if ch.is_control() && !ch.is_whitespace() {
            continue;
        }
        result.extend(ch.to_lowercase());
    }
    result
}

/// Word tokens of at least two word characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    TOKEN_RE
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by adjacent bigrams (`"w1 w2"`) of the filtered tokens.
pub fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut out = Vec::with_capacity(tokens.len() * 2);
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    let mut all = tokens;
    all.append(&mut out);
    all
}
