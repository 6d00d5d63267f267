use serde::Serialize;

use crate::capability::CapabilityKind;
use crate::errors::{Failure, FailureKind};
use crate::request::{GenerationRequest, NormalizedResult, RequestStatus};

pub const RAW_DISPLAY_CHARS: usize = 512;

const GENERIC_RETRY: &str = "Generation failed. Please try again.";

/// What a card shows for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureView {
    pub kind: FailureKind,
    pub message: String,
    /// Raw provider text, truncated and escaped. Only text capabilities set it.
    pub raw: Option<String>,
    pub retry: bool,
}

impl FailureView {
    pub fn for_capability(capability: CapabilityKind, failure: &Failure) -> Self {
        if !capability.shows_raw_diagnostics() {
            return Self {
                kind: failure.kind,
                message: GENERIC_RETRY.to_string(),
                raw: None,
                retry: true,
            };
        }
        Self {
            kind: failure.kind,
            message: failure.message.clone(),
            raw: failure
                .raw
                .as_deref()
                .map(|raw| truncate_text(&escape_controls(raw), RAW_DISPLAY_CHARS)),
            retry: true,
        }
    }
}

/// Display-ready projection of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CardView {
    Idle,
    Working,
    Ready {
        result: ResultView,
        fallback_used: bool,
    },
    Failed(FailureView),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultView {
    Translation(String),
    Emotions(Vec<String>),
    Images(Vec<String>),
    Video(String),
}

impl From<&NormalizedResult> for ResultView {
    fn from(result: &NormalizedResult) -> Self {
        match result {
            NormalizedResult::Translation(text) => Self::Translation(text.clone()),
            NormalizedResult::EmotionClues(words) => Self::Emotions(words.clone()),
            NormalizedResult::ImageSet(urls) => Self::Images(urls.clone()),
            NormalizedResult::VideoClip(url) => Self::Video(url.clone()),
        }
    }
}

impl CardView {
    pub fn of(request: &GenerationRequest) -> Self {
        match request.status() {
            RequestStatus::Idle => Self::Idle,
            RequestStatus::Submitting | RequestStatus::Running => Self::Working,
            RequestStatus::Completed => match request.completion() {
                Some(completion) => Self::Ready {
                    result: ResultView::from(&completion.result),
                    fallback_used: completion.recovery == crate::normalize::Recovery::Fallback,
                },
                None => Self::Idle,
            },
            RequestStatus::Failed => match request.failure() {
                Some(failure) => Self::Failed(FailureView::for_capability(request.kind(), failure)),
                None => Self::Idle,
            },
        }
    }
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Make control characters visible, keeping line breaks readable.
pub fn escape_controls(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' | '\r' | '\t' => out.extend(ch.escape_default()),
            ch if ch.is_control() => out.push_str(&format!("\\u{{{:04x}}}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out
}
