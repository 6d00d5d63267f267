use serde_json::Value;

use super::scan::{balanced_fragments, escape_string_controls};
use super::{fallback_line, strip_wrapping, Normalized};
use crate::errors::{GenerationError, SENTINEL};

pub const TRANSLATION_FIELD: &str = "translation";

/// Values the prompt uses as a format example. An object holding one of
/// these is an echo of the instructions, not an answer.
const PLACEHOLDERS: [&str; 2] = ["...", "…"];

enum Candidate {
    Usable(String),
    Sentinel,
    Echo,
    Unusable,
}

/// Extract the translation string from a completion blob.
///
/// The last object carrying a usable `translation` field wins; objects that
/// fail to parse never disqualify an earlier well-formed one.
pub fn normalize_translation(raw: &str) -> Result<Normalized<String>, GenerationError> {
    let text = strip_wrapping(raw);

    let mut parsed_any = false;
    let mut saw_sentinel = false;
    for fragment in balanced_fragments(&text, '{', '}').into_iter().rev() {
        match parse_candidate(fragment) {
            Some(Candidate::Usable(value)) => return Ok(Normalized::clean(value)),
            Some(Candidate::Sentinel) => saw_sentinel = true,
            Some(Candidate::Unusable) => parsed_any = true,
            Some(Candidate::Echo) => {
                tracing::debug!("skipping echoed format example");
            }
            None => {}
        }
    }

    if saw_sentinel {
        return Err(GenerationError::declined(raw));
    }
    if parsed_any {
        return Err(GenerationError::malformed(
            "response JSON has no usable translation field",
            raw,
        ));
    }

    match fallback_line(&text) {
        Some(line) if line == SENTINEL => Err(GenerationError::declined(raw)),
        Some(line) => {
            tracing::warn!(chars = line.chars().count(), "translation recovered from plain text");
            Ok(Normalized::fallback(line.to_string()))
        }
        None => Err(GenerationError::malformed(
            "response is not valid JSON and holds no usable text",
            raw,
        )),
    }
}

fn parse_candidate(fragment: &str) -> Option<Candidate> {
    let escaped = escape_string_controls(fragment);
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&escaped) else {
        return None;
    };
    let candidate = match object.get(TRANSLATION_FIELD).and_then(Value::as_str) {
        Some(value) if value.trim() == SENTINEL => Candidate::Sentinel,
        Some(value) if PLACEHOLDERS.contains(&value.trim()) => Candidate::Echo,
        Some(value) if !value.trim().is_empty() => Candidate::Usable(value.to_string()),
        _ => Candidate::Unusable,
    };
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::normalize_translation;
    use crate::errors::{FailureKind, GenerationError};
    use crate::normalize::Recovery;

    #[test]
    fn well_formed_payload_is_clean() -> anyhow::Result<()> {
        for value in ["Bonjour", "Hola, mundo", "ERRORS are fine", "€ and \"quotes\""] {
            let raw = serde_json::json!({ "translation": value }).to_string();
            let normalized = normalize_translation(&raw)?;
            assert_eq!(normalized.value, value);
            assert_eq!(normalized.recovery, Recovery::Clean);
        }
        Ok(())
    }

    #[test]
    fn sentinel_is_declined() {
        for raw in [
            r#"{"translation":"ERROR"}"#,
            r#"{"translation": "ERROR"}"#,
            "```json\n{\"translation\": \"ERROR\"}\n```",
        ] {
            let err = normalize_translation(raw).err();
            assert!(
                matches!(err, Some(GenerationError::ProviderDeclined { .. })),
                "{raw} should be declined, got {err:?}"
            );
        }
    }

    #[test]
    fn last_object_wins() -> anyhow::Result<()> {
        let raw = r#"{"translation":"A"} Let me refine that. {"translation":"B"}"#;
        let normalized = normalize_translation(raw)?;
        assert_eq!(normalized.value, "B");
        assert!(!normalized.fallback_used());
        Ok(())
    }

    #[test]
    fn malformed_later_fragment_keeps_earlier_answer() -> anyhow::Result<()> {
        let raw = r#"{"translation":"A"} and then {"translation": B}"#;
        assert_eq!(normalize_translation(raw)?.value, "A");
        Ok(())
    }

    #[test]
    fn usable_answer_beats_echoed_sentinel() -> anyhow::Result<()> {
        let raw = r#"{"translation": "Guten Tag"} (otherwise {"translation": "ERROR"})"#;
        assert_eq!(normalize_translation(raw)?.value, "Guten Tag");
        Ok(())
    }

    #[test]
    fn literal_newline_inside_value_is_repaired() -> anyhow::Result<()> {
        let raw = "{\"translation\":\"line1\nline2\"}";
        let normalized = normalize_translation(raw)?;
        assert_eq!(normalized.value, "line1\nline2");
        assert_eq!(normalized.recovery, Recovery::Clean);
        Ok(())
    }

    #[test]
    fn nested_braces_in_value_survive() -> anyhow::Result<()> {
        let raw = r#"Sure: {"translation": "set {x} to } now"}"#;
        assert_eq!(normalize_translation(raw)?.value, "set {x} to } now");
        Ok(())
    }

    #[test]
    fn plain_text_is_partial_recovery() -> anyhow::Result<()> {
        let raw = "Sorry, I cannot translate this.";
        let normalized = normalize_translation(raw)?;
        assert_eq!(normalized.value, raw);
        assert_eq!(normalized.recovery, Recovery::Fallback);
        Ok(())
    }

    #[test]
    fn fallback_uses_last_plain_line() -> anyhow::Result<()> {
        let raw = "Here is the translation:\n{\"translation\": \"unterminated\nBonjour le monde";
        let normalized = normalize_translation(raw)?;
        assert_eq!(normalized.value, "Bonjour le monde");
        assert!(normalized.fallback_used());
        Ok(())
    }

    #[test]
    fn echoed_format_example_is_never_the_answer() -> anyhow::Result<()> {
        let refusal = r#"{"translation": "..."} is the format; I cannot translate this."#;
        let err = normalize_translation(refusal).err();
        assert_eq!(err.map(|err| err.kind()), Some(FailureKind::Malformed));

        let echo_then_text = "Format: {\"translation\": \"…\"}\nBonsoir tout le monde";
        let normalized = normalize_translation(echo_then_text)?;
        assert_eq!(normalized.value, "Bonsoir tout le monde");
        assert!(normalized.fallback_used());

        let echo_then_json = r#"Use {"translation": "..."}. {"translation": "Buona sera"}"#;
        let normalized = normalize_translation(echo_then_json)?;
        assert_eq!(normalized.value, "Buona sera");
        assert_eq!(normalized.recovery, Recovery::Clean);
        Ok(())
    }

    #[test]
    fn dashes_in_plain_text_are_kept() -> anyhow::Result<()> {
        let raw = "It was late --- far too late.";
        let normalized = normalize_translation(raw)?;
        assert_eq!(normalized.value, raw);
        assert!(normalized.fallback_used());
        Ok(())
    }

    #[test]
    fn object_without_field_is_malformed() {
        let err = normalize_translation(r#"{"text": "Hallo"}"#).err();
        assert_eq!(err.as_ref().map(GenerationError::kind), Some(FailureKind::Malformed));
        assert_eq!(
            err.as_ref().and_then(GenerationError::raw),
            Some(r#"{"text": "Hallo"}"#)
        );
    }

    #[test]
    fn nothing_usable_is_malformed_with_raw_text() {
        let raw = "{\"translation\": \n}";
        let err = normalize_translation(raw).err();
        assert_eq!(err.as_ref().map(GenerationError::kind), Some(FailureKind::Malformed));
        assert_eq!(err.as_ref().and_then(GenerationError::raw), Some(raw));

        let empty = normalize_translation("   ").err();
        assert_eq!(empty.map(|err| err.kind()), Some(FailureKind::Malformed));
    }
}
