//! Owner of all per-capability request state.
//!
//! Provider calls run on short-lived worker threads and report back over a
//! channel. Nothing a worker produces touches state until the owner calls
//! [`Workbench::pump`], and every message is checked against the ticket of
//! the request it was started for.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use writergen_contracts::canvas::{clamp_input, word_count, Card, CardStore, Layout};
use writergen_contracts::errors::FailureKind;
use writergen_contracts::prompts::{VIDEO_NEGATIVE_PROMPT, VIDEO_SIZE};
use writergen_contracts::surface::{EventPayload, Surface, SurfaceEmitter};
use writergen_contracts::view::CardView;
use writergen_contracts::{
    CapabilityKind, Failure, GenerationError, GenerationRequest, Language, NormalizedResult,
    Recovery, RequestStatus, Ticket,
};

use crate::client::{GenerationClient, SiliconFlowClient, VideoRequest};
use crate::config::EngineConfig;
use crate::pipelines::{run_emotion, run_images, run_translation, PipelineOutcome};
use crate::video::{spawn_poll_loop, VideoJob};

pub(crate) enum WorkerMessage {
    Finished {
        kind: CapabilityKind,
        ticket: Ticket,
        outcome: PipelineOutcome,
    },
    VideoSubmitted {
        ticket: Ticket,
        result: Result<String, GenerationError>,
    },
}

pub struct Workbench {
    client: Arc<dyn GenerationClient>,
    config: EngineConfig,
    text: String,
    target: Language,
    translation: GenerationRequest,
    emotion: GenerationRequest,
    image: GenerationRequest,
    video: VideoJob,
    cards: CardStore,
    surface: SurfaceEmitter,
    tx: mpsc::Sender<WorkerMessage>,
    rx: mpsc::Receiver<WorkerMessage>,
}

impl Workbench {
    pub fn new(
        config: EngineConfig,
        client: Arc<dyn GenerationClient>,
        surface: impl Surface + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut cards = CardStore::new(Layout::Desktop);
        cards.enable_video();
        Self {
            client,
            config,
            text: String::new(),
            target: Language::default(),
            translation: GenerationRequest::new(CapabilityKind::Translation),
            emotion: GenerationRequest::new(CapabilityKind::Emotion),
            image: GenerationRequest::new(CapabilityKind::Image),
            video: VideoJob::new(),
            cards,
            surface: SurfaceEmitter::new(surface),
            tx,
            rx,
        }
    }

    /// Workbench talking to SiliconFlow with the given configuration.
    pub fn connect(config: EngineConfig, surface: impl Surface + 'static) -> anyhow::Result<Self> {
        let client = SiliconFlowClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client), surface))
    }

    /// Re-seed the canvas for another layout. Existing generated cards are
    /// dropped.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.cards = CardStore::new(layout);
        self.cards.enable_video();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }

    /// Replace the input text, capped at the input limit. A finished emotion
    /// result no longer matches the text and is cleared.
    pub fn set_text(&mut self, text: &str) {
        let text = clamp_input(text);
        if text == self.text {
            return;
        }
        self.text = text.to_string();
        let mut payload = EventPayload::new();
        payload.insert("chars".to_string(), Value::from(self.text.chars().count()));
        payload.insert("words".to_string(), Value::from(self.word_count()));
        self.surface.emit("input_changed", None, None, payload);

        if self.emotion.status().is_terminal() && self.emotion.reset() {
            tracing::debug!("emotion result cleared after edit");
            self.surface.emit_request(&self.emotion);
        }
    }

    pub fn target_language(&self) -> Language {
        self.target
    }

    pub fn set_target_language(&mut self, target: Language) {
        self.target = target;
    }

    pub fn request(&self, kind: CapabilityKind) -> &GenerationRequest {
        match kind {
            CapabilityKind::Translation => &self.translation,
            CapabilityKind::Emotion => &self.emotion,
            CapabilityKind::Image => &self.image,
            CapabilityKind::Video => self.video.request(),
        }
    }

    pub fn video_job(&self) -> &VideoJob {
        &self.video
    }

    pub fn view(&self, kind: CapabilityKind) -> CardView {
        CardView::of(self.request(kind))
    }

    pub fn cards(&self) -> &CardStore {
        &self.cards
    }

    pub fn move_card(&mut self, id: &str, x: i32, y: i32) -> bool {
        let Some(card) = self.cards.move_card(id, x, y) else {
            return false;
        };
        let payload = card_payload(card);
        self.surface.emit("card_moved", None, None, payload);
        true
    }

    pub fn trigger_translation(&mut self) -> bool {
        let target = self.target;
        let Some((ticket, input)) = self.begin(CapabilityKind::Translation) else {
            return false;
        };
        let model = self.model_for(CapabilityKind::Translation);
        self.spawn(CapabilityKind::Translation, ticket, move |client| {
            run_translation(client, &model, &input, target)
        });
        true
    }

    /// Start emotion extraction. Blank input never reaches the provider.
    pub fn trigger_emotion(&mut self) -> bool {
        let Some((ticket, input)) = self.begin(CapabilityKind::Emotion) else {
            return false;
        };
        let model = self.model_for(CapabilityKind::Emotion);
        self.spawn(CapabilityKind::Emotion, ticket, move |client| {
            run_emotion(client, &model, &input)
        });
        true
    }

    pub fn trigger_images(&mut self) -> bool {
        let Some((ticket, input)) = self.begin(CapabilityKind::Image) else {
            return false;
        };
        let model = self.model_for(CapabilityKind::Image);
        self.spawn(CapabilityKind::Image, ticket, move |client| {
            run_images(client, &model, &input)
        });
        true
    }

    /// Submit a video job. A job that is already running is torn down and
    /// replaced; one still submitting makes this a no-op.
    pub fn trigger_video(&mut self) -> bool {
        if self.text.trim().is_empty() {
            tracing::debug!(capability = "video", "ignoring trigger on blank input");
            return false;
        }
        let input = self.text.clone();
        let Some(ticket) = self.video.start(&input) else {
            tracing::debug!(capability = "video", "request already in flight");
            return false;
        };
        tracing::info!(capability = "video", ticket = ticket.value(), "request started");
        self.surface.emit_request(self.video.request());

        let request = VideoRequest {
            model: self.model_for(CapabilityKind::Video),
            prompt: input,
            negative_prompt: VIDEO_NEGATIVE_PROMPT.to_string(),
            image_size: VIDEO_SIZE.to_string(),
        };
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("writergen-video-submit-{}", ticket.value()))
            .spawn(move || {
                let result = client.submit_video(&request);
                let _ = tx.send(WorkerMessage::VideoSubmitted { ticket, result });
            });
        if let Err(err) = spawned {
            self.apply_finished(CapabilityKind::Video, ticket, spawn_failure(&err));
        }
        true
    }

    pub fn cancel_video(&mut self) -> bool {
        if !self.video.cancel() {
            return false;
        }
        tracing::info!(capability = "video", "request cancelled");
        self.surface.emit_request(self.video.request());
        true
    }

    /// Re-run a failed request from the start with the input it was started
    /// with.
    pub fn retry(&mut self, kind: CapabilityKind) -> bool {
        let request = self.request(kind);
        if request.status() != RequestStatus::Failed {
            return false;
        }
        let Some(input) = request.input().map(str::to_string) else {
            return false;
        };
        let current = std::mem::replace(&mut self.text, input);
        let started = match kind {
            CapabilityKind::Translation => self.trigger_translation(),
            CapabilityKind::Emotion => self.trigger_emotion(),
            CapabilityKind::Image => self.trigger_images(),
            CapabilityKind::Video => self.trigger_video(),
        };
        self.text = current;
        started
    }

    pub fn is_busy(&self) -> bool {
        CapabilityKind::ALL
            .into_iter()
            .any(|kind| self.request(kind).status().is_in_flight())
    }

    /// Apply every worker message received so far. Returns how many were
    /// handled, stale ones included.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.apply(message);
            handled += 1;
        }
        handled
    }

    /// Pump until `done` holds or `timeout` passes.
    pub fn pump_until<F>(&mut self, timeout: Duration, done: F) -> bool
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if done(self) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Ok(message) = self.rx.recv_timeout(deadline - now) {
                self.apply(message);
            }
        }
    }

    /// Pump until no request is submitting or running.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        self.pump_until(timeout, |workbench| !workbench.is_busy())
    }

    fn model_for(&self, kind: CapabilityKind) -> String {
        self.config.models.for_capability(kind).to_string()
    }

    fn slot_mut(&mut self, kind: CapabilityKind) -> Option<&mut GenerationRequest> {
        match kind {
            CapabilityKind::Translation => Some(&mut self.translation),
            CapabilityKind::Emotion => Some(&mut self.emotion),
            CapabilityKind::Image => Some(&mut self.image),
            CapabilityKind::Video => None,
        }
    }

    /// Start a synchronous capability on the current text.
    fn begin(&mut self, kind: CapabilityKind) -> Option<(Ticket, String)> {
        if self.text.trim().is_empty() {
            tracing::debug!(capability = kind.as_str(), "ignoring trigger on blank input");
            return None;
        }
        let input = self.text.clone();
        let request = self.slot_mut(kind)?;
        match request.status() {
            RequestStatus::Submitting | RequestStatus::Running => {
                tracing::debug!(capability = kind.as_str(), "request already in flight");
                return None;
            }
            RequestStatus::Completed | RequestStatus::Failed => {
                request.reset();
            }
            RequestStatus::Idle => {}
        }
        let ticket = request.begin(&input)?;
        tracing::info!(capability = kind.as_str(), ticket = ticket.value(), "request started");
        self.surface.emit_request(self.request(kind));
        Some((ticket, input))
    }

    fn spawn<F>(&mut self, kind: CapabilityKind, ticket: Ticket, job: F)
    where
        F: FnOnce(&dyn GenerationClient) -> PipelineOutcome + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("writergen-{}-{}", kind.as_str(), ticket.value()))
            .spawn(move || {
                let outcome = job(client.as_ref());
                let _ = tx.send(WorkerMessage::Finished {
                    kind,
                    ticket,
                    outcome,
                });
            });
        if let Err(err) = spawned {
            self.apply_finished(kind, ticket, spawn_failure(&err));
        }
    }

    fn apply(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Finished {
                kind,
                ticket,
                outcome,
            } => self.apply_finished(kind, ticket, outcome),
            WorkerMessage::VideoSubmitted { ticket, result } => {
                self.apply_video_submitted(ticket, result)
            }
        }
    }

    fn apply_finished(&mut self, kind: CapabilityKind, ticket: Ticket, outcome: PipelineOutcome) {
        let new_images = match &outcome.result {
            Ok(completion) => match &completion.result {
                NormalizedResult::ImageSet(urls) => urls.clone(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        };
        let video_url = match &outcome.result {
            Ok(completion) => match &completion.result {
                NormalizedResult::VideoClip(url) => Some(url.clone()),
                _ => None,
            },
            Err(_) => None,
        };

        let applied = match kind {
            CapabilityKind::Video => self.video.finish(ticket, outcome),
            _ => match self.slot_mut(kind) {
                Some(request) => match outcome.result {
                    Ok(completion) => request.complete(ticket, completion, outcome.raw),
                    Err(failure) => request.fail(ticket, failure, outcome.raw),
                },
                None => false,
            },
        };
        if !applied {
            tracing::debug!(
                capability = kind.as_str(),
                ticket = ticket.value(),
                "discarding stale result"
            );
            return;
        }

        let request = self.request(kind);
        tracing::info!(
            capability = kind.as_str(),
            ticket = ticket.value(),
            status = request.status().as_str(),
            fallback_used = request
                .completion()
                .is_some_and(|completion| completion.recovery == Recovery::Fallback),
            "request finished"
        );
        self.surface.emit_request(self.request(kind));

        for card in self.cards.add_images(&new_images) {
            self.surface.emit(
                "card_added",
                Some(CapabilityKind::Image),
                Some(ticket),
                card_payload(&card),
            );
        }
        if let Some(url) = video_url {
            let card = self.cards.add_video(&url);
            self.surface.emit(
                "card_added",
                Some(CapabilityKind::Video),
                Some(ticket),
                card_payload(&card),
            );
        }
    }

    fn apply_video_submitted(&mut self, ticket: Ticket, result: Result<String, GenerationError>) {
        if !self.video.request().is_current(ticket) {
            tracing::debug!(ticket = ticket.value(), "discarding stale video submission");
            return;
        }
        let job_id = match result {
            Ok(job_id) => job_id,
            Err(err) => {
                let failure = Failure::from(err).with_stage("video submit");
                self.apply_finished(
                    CapabilityKind::Video,
                    ticket,
                    PipelineOutcome {
                        result: Err(failure),
                        raw: None,
                    },
                );
                return;
            }
        };

        let handle = match spawn_poll_loop(
            Arc::clone(&self.client),
            job_id.clone(),
            ticket,
            self.config.poll_interval,
            self.tx.clone(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.apply_finished(CapabilityKind::Video, ticket, spawn_failure(&err));
                return;
            }
        };
        if self.video.attach(ticket, &job_id, handle) {
            tracing::info!(
                capability = "video",
                ticket = ticket.value(),
                job_id = job_id.as_str(),
                "video job running"
            );
            self.surface.emit_request(self.video.request());
        }
    }
}

fn card_payload(card: &Card) -> EventPayload {
    let value = json!({
        "card_id": card.id,
        "kind": card.kind.as_str(),
        "url": card.url,
        "x": card.x,
        "y": card.y,
        "z": card.z,
    });
    value.as_object().cloned().unwrap_or_default()
}

fn spawn_failure(err: &std::io::Error) -> PipelineOutcome {
    PipelineOutcome {
        result: Err(Failure::new(
            FailureKind::Transport,
            format!("worker thread spawn failed: {err}"),
        )),
        raw: None,
    }
}
