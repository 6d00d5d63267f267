//! Scripted [`GenerationClient`] for tests. Replies are consumed in order;
//! exhausted chat and image scripts fail with a transport error and exhausted
//! poll scripts keep answering `Pending`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use writergen_contracts::GenerationError;

use crate::client::{ChatRequest, GenerationClient, ImageRequest, VideoRequest, VideoStatus};

pub(crate) struct Reply;

impl Reply {
    pub(crate) fn ok(text: &str) -> Result<String, GenerationError> {
        Ok(text.to_string())
    }

    pub(crate) fn transport(message: &str) -> Result<String, GenerationError> {
        Err(GenerationError::transport(message))
    }
}

pub(crate) struct PollReply {
    delay: Duration,
    result: Result<VideoStatus, GenerationError>,
}

impl PollReply {
    pub(crate) fn now(result: Result<VideoStatus, GenerationError>) -> Self {
        Self::after(Duration::ZERO, result)
    }

    pub(crate) fn after(delay: Duration, result: Result<VideoStatus, GenerationError>) -> Self {
        Self { delay, result }
    }
}

#[derive(Default)]
struct Script {
    chats: VecDeque<Result<String, GenerationError>>,
    images: VecDeque<Result<Vec<String>, GenerationError>>,
    submits: VecDeque<Result<String, GenerationError>>,
    polls: HashMap<String, VecDeque<PollReply>>,
    chat_requests: Vec<ChatRequest>,
    image_calls: usize,
    submit_calls: usize,
    poll_calls: HashMap<String, usize>,
}

#[derive(Default)]
pub(crate) struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn chat(self, reply: Result<String, GenerationError>) -> Self {
        self.with(|script| script.chats.push_back(reply));
        self
    }

    pub(crate) fn images(self, reply: Result<Vec<String>, GenerationError>) -> Self {
        self.with(|script| script.images.push_back(reply));
        self
    }

    pub(crate) fn submit(self, reply: Result<String, GenerationError>) -> Self {
        self.with(|script| script.submits.push_back(reply));
        self
    }

    pub(crate) fn poll(self, job_id: &str, reply: PollReply) -> Self {
        self.with(|script| {
            script
                .polls
                .entry(job_id.to_string())
                .or_default()
                .push_back(reply)
        });
        self
    }

    pub(crate) fn chat_requests(&self) -> Vec<ChatRequest> {
        self.with(|script| script.chat_requests.clone())
    }

    pub(crate) fn chat_calls(&self) -> usize {
        self.with(|script| script.chat_requests.len())
    }

    pub(crate) fn poll_calls(&self, job_id: &str) -> usize {
        self.with(|script| script.poll_calls.get(job_id).copied().unwrap_or(0))
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.with(|script| {
            script.chat_requests.len()
                + script.image_calls
                + script.submit_calls
                + script.poll_calls.values().sum::<usize>()
        })
    }

    /// Block until `job_id` has been polled at least `count` times.
    pub(crate) fn wait_for_polls(&self, job_id: &str, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.poll_calls(job_id) < count {
            assert!(Instant::now() < deadline, "timed out waiting for polls of {job_id}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut script)
    }
}

impl GenerationClient for ScriptedClient {
    fn complete_chat(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        self.with(|script| {
            script.chat_requests.push(request.clone());
            script
                .chats
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::transport("no scripted chat reply")))
        })
    }

    fn generate_images(&self, _request: &ImageRequest) -> Result<Vec<String>, GenerationError> {
        self.with(|script| {
            script.image_calls += 1;
            script
                .images
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::transport("no scripted image reply")))
        })
    }

    fn submit_video(&self, _request: &VideoRequest) -> Result<String, GenerationError> {
        self.with(|script| {
            script.submit_calls += 1;
            script
                .submits
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::transport("no scripted submit reply")))
        })
    }

    fn poll_video(&self, job_id: &str) -> Result<VideoStatus, GenerationError> {
        let reply = self.with(|script| {
            *script.poll_calls.entry(job_id.to_string()).or_default() += 1;
            script
                .polls
                .get_mut(job_id)
                .and_then(VecDeque::pop_front)
        });
        match reply {
            Some(reply) => {
                if !reply.delay.is_zero() {
                    thread::sleep(reply.delay);
                }
                reply.result
            }
            None => Ok(VideoStatus::Pending),
        }
    }
}
