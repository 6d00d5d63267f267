use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use writergen_contracts::prompts::{ChatParams, ImageParams};
use writergen_contracts::view::truncate_text;
use writergen_contracts::GenerationError;

use crate::config::EngineConfig;

const PROVIDER: &str = "SiliconFlow";
const ERROR_TEXT_CHARS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_text: String,
    pub params: ChatParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub params: ImageParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub image_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStatus {
    Pending,
    Completed(String),
    Failed { reason: String },
}

/// Remote generation capabilities. Each call is one blocking exchange.
pub trait GenerationClient: Send + Sync {
    /// Raw text of the first choice, unmodified.
    fn complete_chat(&self, request: &ChatRequest) -> Result<String, GenerationError>;
    /// Image URLs in provider order. An empty list is a valid answer.
    fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>, GenerationError>;
    /// Provider-assigned job identifier.
    fn submit_video(&self, request: &VideoRequest) -> Result<String, GenerationError>;
    /// Only transport problems are errors; provider statuses map onto
    /// [`VideoStatus`].
    fn poll_video(&self, job_id: &str) -> Result<VideoStatus, GenerationError>;
}

/// [`GenerationClient`] over the SiliconFlow REST API.
pub struct SiliconFlowClient {
    http: HttpClient,
    api_base: String,
    api_key: String,
}

impl SiliconFlowClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        // Provider latency is trusted; calls never time out locally.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key: config.api_key().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint(path);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .with_context(|| format!("{PROVIDER} request failed ({endpoint})"))?;
        response_json_or_error(PROVIDER, response)
    }

    fn chat(&self, request: &ChatRequest) -> Result<Value> {
        self.post_json(
            "chat/completions",
            &json!({
                "model": request.model,
                "messages": [
                    { "role": "system", "content": request.system_prompt },
                    { "role": "user", "content": request.user_text },
                ],
                "temperature": request.params.temperature,
                "max_tokens": request.params.max_tokens,
                "stream": false,
            }),
        )
    }
}

impl GenerationClient for SiliconFlowClient {
    fn complete_chat(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let payload = self.chat(request).map_err(transport_error)?;
        payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::malformed("chat response has no message content", payload.to_string())
            })
    }

    fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>, GenerationError> {
        let payload = self
            .post_json(
                "images/generations",
                &json!({
                    "model": request.model,
                    "prompt": request.prompt,
                    "image_size": request.params.image_size,
                    "batch_size": request.params.batch_size,
                    "num_inference_steps": request.params.num_inference_steps,
                    "guidance_scale": request.params.guidance_scale,
                }),
            )
            .map_err(transport_error)?;
        Ok(image_urls(&payload))
    }

    fn submit_video(&self, request: &VideoRequest) -> Result<String, GenerationError> {
        let payload = self
            .post_json(
                "video/submit",
                &json!({
                    "model": request.model,
                    "prompt": request.prompt,
                    "negative_prompt": request.negative_prompt,
                    "image_size": request.image_size,
                }),
            )
            .map_err(transport_error)?;
        payload
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::malformed("video submit response has no requestId", payload.to_string())
            })
    }

    fn poll_video(&self, job_id: &str) -> Result<VideoStatus, GenerationError> {
        let payload = self
            .post_json("video/retrieve", &json!({ "requestId": job_id }))
            .with_context(|| format!("video status check failed for requestId {job_id}"))
            .map_err(transport_error)?;
        Ok(video_status_from_payload(&payload))
    }
}

fn image_urls(payload: &Value) -> Vec<String> {
    payload
        .get("images")
        .or_else(|| payload.get("data"))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get("url").and_then(Value::as_str))
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Map a status payload onto [`VideoStatus`].
///
/// Status words are compared case-insensitively with separators removed, so
/// `InQueue`, `in_queue` and `in-queue` all read as pending.
pub fn video_status_from_payload(payload: &Value) -> VideoStatus {
    let raw_status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let status: String = raw_status
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect();

    match status.as_str() {
        "queued" | "running" | "processing" | "pending" | "inqueue" | "inprogress" => {
            VideoStatus::Pending
        }
        "succeed" | "succeeded" | "success" | "completed" => match first_video_url(payload) {
            Some(url) => VideoStatus::Completed(url),
            None => VideoStatus::Failed {
                reason: "provider reported success without a video asset".to_string(),
            },
        },
        _ => {
            let reason = payload
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("provider status '{raw_status}'"));
            VideoStatus::Failed { reason }
        }
    }
}

fn first_video_url(payload: &Value) -> Option<String> {
    payload
        .pointer("/results/videos/0/url")
        .or_else(|| payload.get("videoUrl"))
        .or_else(|| payload.pointer("/videos/0/url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn transport_error(err: anyhow::Error) -> GenerationError {
    let message = error_chain_text(&err, ERROR_TEXT_CHARS);
    tracing::warn!(error = message.as_str(), "provider call failed");
    GenerationError::transport(message)
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;
    use writergen_contracts::prompts::{EMOTION_PARAMS, IMAGE_PARAMS};
    use writergen_contracts::{FailureKind, GenerationError};

    use super::*;

    fn client_for(server: &Server) -> anyhow::Result<SiliconFlowClient> {
        let mut config = EngineConfig::with_api_key("sk-test")?;
        config.api_base = server.url();
        SiliconFlowClient::new(&config)
    }

    fn chat_request() -> ChatRequest {
        ChatRequest {
            model: "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B".to_string(),
            system_prompt: "Name the emotions.".to_string(),
            user_text: "The rain kept falling.".to_string(),
            params: EMOTION_PARAMS,
        }
    }

    #[test]
    fn chat_returns_first_choice_verbatim() -> anyhow::Result<()> {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B",
                "max_tokens": 64,
                "messages": [
                    { "role": "system", "content": "Name the emotions." },
                    { "role": "user", "content": "The rain kept falling." },
                ],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "choices": [{ "message": { "content": "```json\n[\"grief\"]\n```" } }] })
                    .to_string(),
            )
            .create();

        let client = client_for(&server)?;
        let raw = client.complete_chat(&chat_request())?;
        assert_eq!(raw, "```json\n[\"grief\"]\n```");
        mock.assert();
        Ok(())
    }

    #[test]
    fn http_failure_is_a_transport_error() -> anyhow::Result<()> {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("{\"message\":\"Invalid token\"}")
            .create();

        let client = client_for(&server)?;
        let err = client.complete_chat(&chat_request()).err();
        let Some(GenerationError::Transport(message)) = err else {
            panic!("expected transport error, got {err:?}");
        };
        assert!(message.contains("(401)"));
        assert!(message.contains("Invalid token"));
        assert!(!message.contains("sk-test"));
        Ok(())
    }

    #[test]
    fn video_status_errors_name_the_job() -> anyhow::Result<()> {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/video/retrieve")
            .with_status(503)
            .with_body("upstream busy")
            .create();

        let client = client_for(&server)?;
        let err = client.poll_video("job-77").err();
        let Some(GenerationError::Transport(message)) = err else {
            panic!("expected transport error, got {err:?}");
        };
        assert!(
            message.starts_with("video status check failed for requestId job-77 | caused by: "),
            "{message}"
        );
        assert!(message.contains("(503)"));
        Ok(())
    }

    #[test]
    fn chat_without_content_is_malformed() -> anyhow::Result<()> {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("{\"choices\":[]}")
            .create();

        let client = client_for(&server)?;
        let err = client.complete_chat(&chat_request()).err();
        assert_eq!(err.map(|err| err.kind()), Some(FailureKind::Malformed));
        Ok(())
    }

    #[test]
    fn images_keep_provider_order() -> anyhow::Result<()> {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/images/generations")
            .match_body(Matcher::PartialJson(json!({
                "model": "Kwai-Kolors/Kolors",
                "batch_size": 3,
                "image_size": "1024x1024",
                "num_inference_steps": 20,
            })))
            .with_status(200)
            .with_body(
                json!({ "images": [{ "url": "https://img/1.png" }, { "url": "https://img/2.png" }] })
                    .to_string(),
            )
            .create();

        let client = client_for(&server)?;
        let urls = client.generate_images(&ImageRequest {
            model: "Kwai-Kolors/Kolors".to_string(),
            prompt: "a lighthouse".to_string(),
            params: IMAGE_PARAMS,
        })?;
        assert_eq!(urls, vec!["https://img/1.png", "https://img/2.png"]);
        mock.assert();
        Ok(())
    }

    #[test]
    fn empty_image_list_is_success() -> anyhow::Result<()> {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body("{\"images\":[]}")
            .create();

        let client = client_for(&server)?;
        let urls = client.generate_images(&ImageRequest {
            model: "Kwai-Kolors/Kolors".to_string(),
            prompt: "nothing".to_string(),
            params: IMAGE_PARAMS,
        })?;
        assert!(urls.is_empty());
        Ok(())
    }

    #[test]
    fn video_submit_then_status() -> anyhow::Result<()> {
        let mut server = Server::new();
        let submit = server
            .mock("POST", "/video/submit")
            .match_body(Matcher::PartialJson(json!({
                "model": "Wan-AI/Wan2.1-T2V-14B",
                "image_size": "1280x720",
            })))
            .with_status(200)
            .with_body("{\"requestId\":\"job-42\"}")
            .create();
        let status = server
            .mock("POST", "/video/retrieve")
            .match_body(Matcher::Json(json!({ "requestId": "job-42" })))
            .with_status(200)
            .with_body(
                json!({ "status": "Succeed", "results": { "videos": [{ "url": "https://v/42.mp4" }] } })
                    .to_string(),
            )
            .create();

        let client = client_for(&server)?;
        let job_id = client.submit_video(&VideoRequest {
            model: "Wan-AI/Wan2.1-T2V-14B".to_string(),
            prompt: "a storm over the sea".to_string(),
            negative_prompt: String::new(),
            image_size: "1280x720".to_string(),
        })?;
        assert_eq!(job_id, "job-42");
        assert_eq!(
            client.poll_video(&job_id)?,
            VideoStatus::Completed("https://v/42.mp4".to_string())
        );
        submit.assert();
        status.assert();
        Ok(())
    }

    #[test]
    fn provider_statuses_map_onto_three_outcomes() {
        for status in ["queued", "Running", "processing", "pending", "InQueue", "InProgress"] {
            assert_eq!(
                video_status_from_payload(&json!({ "status": status })),
                VideoStatus::Pending,
                "{status}"
            );
        }
        assert_eq!(
            video_status_from_payload(&json!({ "status": "completed", "videoUrl": "https://v/a.mp4" })),
            VideoStatus::Completed("https://v/a.mp4".to_string())
        );
        assert!(matches!(
            video_status_from_payload(&json!({ "status": "Succeed", "results": { "videos": [] } })),
            VideoStatus::Failed { .. }
        ));
        assert_eq!(
            video_status_from_payload(&json!({ "status": "Failed", "reason": "content moderated" })),
            VideoStatus::Failed {
                reason: "content moderated".to_string()
            }
        );
        assert!(matches!(
            video_status_from_payload(&json!({})),
            VideoStatus::Failed { .. }
        ));
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow::anyhow!("connection refused")
            .context("SiliconFlow request failed (http://127.0.0.1:1/chat/completions)");
        let rendered = error_chain_text(&err, 400);
        assert!(rendered.contains("SiliconFlow request failed"));
        assert!(rendered.contains("connection refused"));
    }
}
