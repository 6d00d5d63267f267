use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::capability::CapabilityKind;
use crate::errors::Failure;
use crate::normalize::Recovery;

/// Identifies one start of a request. Results carrying an older ticket are
/// stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Idle,
    Submitting,
    Running,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Submitting | Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    Translation(String),
    EmotionClues(Vec<String>),
    ImageSet(Vec<String>),
    VideoClip(String),
}

impl NormalizedResult {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Translation(_) => CapabilityKind::Translation,
            Self::EmotionClues(_) => CapabilityKind::Emotion,
            Self::ImageSet(_) => CapabilityKind::Image,
            Self::VideoClip(_) => CapabilityKind::Video,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Translation(text) => json!({ "translation": text }),
            Self::EmotionClues(words) => json!({ "emotions": words }),
            Self::ImageSet(urls) => json!({ "image_urls": urls }),
            Self::VideoClip(url) => json!({ "video_url": url }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub result: NormalizedResult,
    pub recovery: Recovery,
}

impl Completion {
    pub fn clean(result: NormalizedResult) -> Self {
        Self {
            result,
            recovery: Recovery::Clean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Submitting {
        ticket: Ticket,
        input: String,
    },
    Running {
        ticket: Ticket,
        input: String,
        job_id: String,
    },
    Completed {
        ticket: Ticket,
        input: String,
        completion: Completion,
    },
    Failed {
        ticket: Ticket,
        input: String,
        failure: Failure,
    },
}

impl RequestState {
    pub fn status(&self) -> RequestStatus {
        match self {
            Self::Idle => RequestStatus::Idle,
            Self::Submitting { .. } => RequestStatus::Submitting,
            Self::Running { .. } => RequestStatus::Running,
            Self::Completed { .. } => RequestStatus::Completed,
            Self::Failed { .. } => RequestStatus::Failed,
        }
    }

    fn ticket(&self) -> Option<Ticket> {
        match self {
            Self::Idle => None,
            Self::Submitting { ticket, .. }
            | Self::Running { ticket, .. }
            | Self::Completed { ticket, .. }
            | Self::Failed { ticket, .. } => Some(*ticket),
        }
    }

    fn input(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Submitting { input, .. }
            | Self::Running { input, .. }
            | Self::Completed { input, .. }
            | Self::Failed { input, .. } => Some(input.as_str()),
        }
    }
}

/// One capability's request record, mutated only through the transitions
/// below.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    id: Option<Uuid>,
    kind: CapabilityKind,
    state: RequestState,
    raw_response: Option<String>,
    issued: u64,
}

impl GenerationRequest {
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            id: None,
            kind,
            state: RequestState::Idle,
            raw_response: None,
            issued: 0,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn status(&self) -> RequestStatus {
        self.state.status()
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.state.ticket()
    }

    /// Input snapshot captured when the request started.
    pub fn input(&self) -> Option<&str> {
        self.state.input()
    }

    pub fn raw_response(&self) -> Option<&str> {
        self.raw_response.as_deref()
    }

    pub fn job_id(&self) -> Option<&str> {
        match &self.state {
            RequestState::Running { job_id, .. } => Some(job_id.as_str()),
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&Completion> {
        match &self.state {
            RequestState::Completed { completion, .. } => Some(completion),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&NormalizedResult> {
        self.completion().map(|completion| &completion.result)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.state {
            RequestState::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Whether `ticket` belongs to the request currently in flight.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.status().is_in_flight() && self.ticket() == Some(ticket)
    }

    /// `idle | failed → submitting`. Any other state leaves the record
    /// untouched and returns `None`.
    pub fn begin(&mut self, input: &str) -> Option<Ticket> {
        match self.state {
            RequestState::Idle | RequestState::Failed { .. } => {}
            RequestState::Submitting { .. }
            | RequestState::Running { .. }
            | RequestState::Completed { .. } => return None,
        }
        self.issued += 1;
        let ticket = Ticket(self.issued);
        self.id = Some(Uuid::new_v4());
        self.raw_response = None;
        self.state = RequestState::Submitting {
            ticket,
            input: input.to_string(),
        };
        Some(ticket)
    }

    /// `submitting → running` once the provider assigned a job id.
    pub fn mark_running(&mut self, ticket: Ticket, job_id: &str) -> bool {
        if self.kind != CapabilityKind::Video || job_id.trim().is_empty() {
            return false;
        }
        let RequestState::Submitting {
            ticket: current,
            input,
        } = &self.state
        else {
            return false;
        };
        if *current != ticket {
            return false;
        }
        self.state = RequestState::Running {
            ticket,
            input: input.clone(),
            job_id: job_id.to_string(),
        };
        true
    }

    /// `submitting | running → completed`.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        completion: Completion,
        raw_response: Option<String>,
    ) -> bool {
        if completion.result.kind() != self.kind || !self.is_current(ticket) {
            return false;
        }
        let input = self.state.input().unwrap_or_default().to_string();
        self.raw_response = raw_response;
        self.state = RequestState::Completed {
            ticket,
            input,
            completion,
        };
        true
    }

    /// `submitting | running → failed`.
    pub fn fail(&mut self, ticket: Ticket, failure: Failure, raw_response: Option<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let input = self.state.input().unwrap_or_default().to_string();
        self.raw_response = raw_response;
        self.state = RequestState::Failed {
            ticket,
            input,
            failure,
        };
        true
    }

    /// `submitting | running → idle`. The cancelled ticket never matches
    /// again, so late results are dropped.
    pub fn cancel(&mut self) -> bool {
        if !self.status().is_in_flight() {
            return false;
        }
        self.state = RequestState::Idle;
        self.raw_response = None;
        true
    }

    /// `completed | failed → idle`.
    pub fn reset(&mut self) -> bool {
        if !self.status().is_terminal() {
            return false;
        }
        self.state = RequestState::Idle;
        self.raw_response = None;
        true
    }
}
