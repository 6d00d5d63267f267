use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use writergen_contracts::errors::FailureKind;
use writergen_contracts::{
    CapabilityKind, Completion, Failure, GenerationRequest, NormalizedResult, RequestStatus,
    Ticket,
};

use crate::client::{GenerationClient, VideoStatus};
use crate::pipelines::PipelineOutcome;
use crate::workbench::WorkerMessage;

const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Active flag of one poll loop.
///
/// Dropping the handle deactivates the loop. The thread is never joined: a
/// status call already on the wire finishes in the background and its
/// result is discarded.
#[derive(Debug)]
pub struct PollHandle {
    active: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Video request record plus its poll loop. A poll handle is held exactly
/// while the request is `running`.
#[derive(Debug)]
pub struct VideoJob {
    request: GenerationRequest,
    poll: Option<PollHandle>,
}

impl Default for VideoJob {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoJob {
    pub fn new() -> Self {
        Self {
            request: GenerationRequest::new(CapabilityKind::Video),
            poll: None,
        }
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn has_poll_handle(&self) -> bool {
        self.poll.is_some()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.request.job_id()
    }

    /// Start a new job. A running job is torn down first and a terminal one
    /// is cleared; a job still submitting makes this a no-op.
    pub fn start(&mut self, input: &str) -> Option<Ticket> {
        match self.request.status() {
            RequestStatus::Submitting => return None,
            RequestStatus::Running => {
                self.cancel();
            }
            RequestStatus::Completed | RequestStatus::Failed => {
                self.request.reset();
            }
            RequestStatus::Idle => {}
        }
        self.request.begin(input)
    }

    /// `submitting → running`, taking ownership of the poll loop. A handle
    /// offered for a stale ticket is cancelled straight away.
    pub fn attach(&mut self, ticket: Ticket, job_id: &str, handle: PollHandle) -> bool {
        if !self.request.mark_running(ticket, job_id) {
            handle.cancel();
            return false;
        }
        self.poll = Some(handle);
        self.check_invariant();
        true
    }

    /// Apply a terminal outcome for `ticket`. Returns false when stale.
    pub fn finish(&mut self, ticket: Ticket, outcome: PipelineOutcome) -> bool {
        let applied = match outcome.result {
            Ok(completion) => self.request.complete(ticket, completion, outcome.raw),
            Err(failure) => self.request.fail(ticket, failure, outcome.raw),
        };
        if applied {
            self.release_poll();
        }
        self.check_invariant();
        applied
    }

    /// `submitting | running → idle`, tearing down any poll loop.
    pub fn cancel(&mut self) -> bool {
        self.release_poll();
        self.request.cancel()
    }

    fn release_poll(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.cancel();
        }
    }

    fn check_invariant(&self) {
        debug_assert_eq!(
            self.poll.is_some(),
            self.request.status() == RequestStatus::Running,
            "poll handle must exist exactly while running"
        );
    }
}

/// Spawn the status loop for `job_id`.
///
/// The loop waits one interval before each status call. The active flag is
/// read before the call and again before the result is sent; a cleared flag
/// ends the loop without sending anything.
pub(crate) fn spawn_poll_loop(
    client: Arc<dyn GenerationClient>,
    job_id: String,
    ticket: Ticket,
    interval: Duration,
    tx: mpsc::Sender<WorkerMessage>,
) -> std::io::Result<PollHandle> {
    let active = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&active);
    thread::Builder::new()
        .name(format!("writergen-video-poll-{}", ticket.value()))
        .spawn(move || poll_until_terminal(client.as_ref(), &job_id, ticket, interval, &flag, &tx))?;
    Ok(PollHandle { active })
}

fn poll_until_terminal(
    client: &dyn GenerationClient,
    job_id: &str,
    ticket: Ticket,
    interval: Duration,
    active: &AtomicBool,
    tx: &mpsc::Sender<WorkerMessage>,
) {
    let mut tick: u32 = 0;
    loop {
        if !sleep_while_active(interval, active) {
            tracing::debug!(job_id, ticket = ticket.value(), "video poll loop cancelled");
            return;
        }
        tick += 1;
        let status = client.poll_video(job_id);
        if !active.load(Ordering::SeqCst) {
            tracing::debug!(job_id, tick, "discarding video status after cancellation");
            return;
        }

        let outcome = match status {
            Ok(VideoStatus::Pending) => {
                tracing::debug!(job_id, tick, "video still pending");
                continue;
            }
            Ok(VideoStatus::Completed(url)) => PipelineOutcome {
                result: Ok(Completion::clean(NormalizedResult::VideoClip(url))),
                raw: None,
            },
            Ok(VideoStatus::Failed { reason }) => PipelineOutcome {
                result: Err(Failure::new(
                    FailureKind::Transport,
                    format!("video generation failed: {reason}"),
                )),
                raw: None,
            },
            Err(err) => PipelineOutcome {
                result: Err(Failure::from(err).with_stage("video status")),
                raw: None,
            },
        };
        tracing::debug!(job_id, tick, "video poll loop reached a terminal status");
        let _ = tx.send(WorkerMessage::Finished {
            kind: CapabilityKind::Video,
            ticket,
            outcome,
        });
        return;
    }
}

/// Sleep for `interval` in short slices. Returns false once `active` clears.
fn sleep_while_active(interval: Duration, active: &AtomicBool) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if !active.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
