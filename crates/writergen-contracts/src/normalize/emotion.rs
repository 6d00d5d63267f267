use serde_json::Value;

use super::scan::{balanced_fragments, escape_string_controls};
use super::{plain_lines, strip_wrapping, Normalized};
use crate::errors::{GenerationError, SENTINEL};

pub const MAX_EMOTIONS: usize = 7;

/// Extract the ordered emotion words from a completion blob.
///
/// Only the first balanced array is considered. Lists longer than
/// [`MAX_EMOTIONS`] are cut down.
pub fn normalize_emotions(raw: &str) -> Result<Normalized<Vec<String>>, GenerationError> {
    let text = strip_wrapping(raw);

    if let Some(fragment) = balanced_fragments(&text, '[', ']').into_iter().next() {
        let escaped = escape_string_controls(fragment);
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&escaped) {
            let words: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|word| !word.is_empty())
                .map(str::to_string)
                .collect();
            return finish(words, raw, Normalized::clean);
        }
    }

    if text.starts_with('{') {
        return Err(GenerationError::malformed(
            "model returned an object instead of an array",
            raw,
        ));
    }

    // Plain lists come one per line or comma separated; lead-in lines such
    // as "The passage conveys:" carry no emotion.
    let words: Vec<String> = plain_lines(&text)
        .filter(|line| !line.ends_with(':'))
        .flat_map(|line| line.split([',', '，', ';']))
        .map(clean_word)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return Err(GenerationError::malformed(
            "response is not valid JSON and holds no usable text",
            raw,
        ));
    }
    tracing::warn!(count = words.len(), "emotions recovered from plain text");
    finish(words, raw, Normalized::fallback)
}

fn finish(
    mut words: Vec<String>,
    raw: &str,
    wrap: fn(Vec<String>) -> Normalized<Vec<String>>,
) -> Result<Normalized<Vec<String>>, GenerationError> {
    match words.first().map(String::as_str) {
        None => Err(GenerationError::malformed("model returned no emotions", raw)),
        Some(SENTINEL) => Err(GenerationError::declined(raw)),
        Some(_) => {
            words.truncate(MAX_EMOTIONS);
            Ok(wrap(words))
        }
    }
}

fn clean_word(word: &str) -> &str {
    word.trim()
        .trim_start_matches(|ch: char| ch.is_ascii_digit() || matches!(ch, ')' | '•'))
        .trim_matches(|ch: char| {
            ch.is_whitespace() || matches!(ch, '"' | '\'' | '[' | ']' | '.' | '`' | '*' | '-')
        })
}
