//! Best-effort extraction of typed results from completion text.
//!
//! Providers are told to answer with a single minified JSON value, but the
//! text that comes back may carry reasoning blocks, markdown fences, echoed
//! prompts or several fragments. Each normalizer walks the same ladder:
//!
//! 1. trim, drop `<think>` blocks and unwrap code fences
//! 2. locate balanced fragments of the expected bracket type
//! 3. escape raw control characters inside string values
//! 4. parse and check the shape, honouring the `ERROR` sentinel
//! 5. otherwise recover plain text lines and flag the result as a fallback

mod emotion;
mod scan;
mod translation;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub use emotion::{normalize_emotions, MAX_EMOTIONS};
pub use translation::{normalize_translation, TRANSLATION_FIELD};

/// Separator used when raw outputs of several hops are joined for display.
pub const HOP_SEPARATOR: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// The response parsed as the expected JSON shape.
    Clean,
    /// JSON parsing failed and a plain text line was used instead.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    pub value: T,
    pub recovery: Recovery,
}

impl<T> Normalized<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            recovery: Recovery::Clean,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            recovery: Recovery::Fallback,
        }
    }

    pub fn fallback_used(&self) -> bool {
        self.recovery == Recovery::Fallback
    }
}

fn fence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?([\s\S]*?)```").ok())
        .as_ref()
}

fn think_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").ok())
        .as_ref()
}

/// Trim the blob and remove wrapping that never belongs to the answer.
pub(crate) fn strip_wrapping(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if let Some(pattern) = think_pattern() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    if let Some(pattern) = fence_pattern() {
        text = pattern.replace_all(&text, "$1").into_owned();
    }
    text = text.trim().to_string();

    // A response cut off by the token limit can leave an unterminated fence.
    if let Some(rest) = text.strip_prefix("```") {
        let body = rest
            .split_once('\n')
            .map(|(_, body)| body)
            .unwrap_or_default();
        text = body.trim().to_string();
    }
    text
}

/// Trimmed lines of `text` that can carry an answer. Blank lines, hop
/// separators and lines that open or close a brace fragment are dropped.
pub(crate) fn plain_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != HOP_SEPARATOR)
        .filter(|line| !line.starts_with('{') && !line.ends_with('}'))
}

/// Last plain line of `text`, returned verbatim.
pub(crate) fn fallback_line(text: &str) -> Option<&str> {
    plain_lines(text).last()
}
