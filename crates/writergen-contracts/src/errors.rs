use serde::Serialize;
use thiserror::Error;

/// Literal a provider is instructed to return when it cannot comply.
pub const SENTINEL: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("the model declined to answer")]
    ProviderDeclined { raw: String },
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw: String },
}

impl GenerationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn declined(raw: impl Into<String>) -> Self {
        Self::ProviderDeclined { raw: raw.into() }
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::ProviderDeclined { .. } => FailureKind::Declined,
            Self::MalformedResponse { .. } => FailureKind::Malformed,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Transport(_) => None,
            Self::ProviderDeclined { raw } | Self::MalformedResponse { raw, .. } => {
                Some(raw.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Declined,
    Malformed,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Declined => "declined",
            Self::Malformed => "malformed",
        }
    }
}

/// Failure recorded on a request once it reaches `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub raw: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw: None,
        }
    }

    /// Prefix the message with the pipeline stage that failed.
    pub fn with_stage(mut self, stage: &str) -> Self {
        self.message = format!("{stage}: {}", self.message);
        self
    }

    pub fn with_raw(mut self, raw: Option<String>) -> Self {
        if raw.is_some() {
            self.raw = raw;
        }
        self
    }
}

impl From<GenerationError> for Failure {
    fn from(err: GenerationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            raw: err.raw().map(str::to_string),
        }
    }
}
