//! Synchronous capability pipelines: one provider round-trip (two for a
//! pivoted translation) followed by normalization.

use writergen_contracts::normalize::{normalize_emotions, normalize_translation, HOP_SEPARATOR};
use writergen_contracts::prompts::{
    emotion_prompt, hop_label, translation_prompt, EMOTION_PARAMS, IMAGE_PARAMS,
    TRANSLATION_PARAMS,
};
use writergen_contracts::{
    Completion, Failure, GenerationError, Language, NormalizedResult, Recovery,
};

use crate::client::{ChatRequest, GenerationClient, ImageRequest};

/// Result of one pipeline run plus the raw provider text kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub result: Result<Completion, Failure>,
    pub raw: Option<String>,
}

impl PipelineOutcome {
    fn completed(completion: Completion, raw: Option<String>) -> Self {
        Self {
            result: Ok(completion),
            raw,
        }
    }

    fn failed(failure: Failure, raw: Option<String>) -> Self {
        Self {
            result: Err(failure),
            raw,
        }
    }
}

struct Hop {
    from: Option<Language>,
    to: Language,
}

fn translation_hops(target: Language) -> Vec<Hop> {
    let pivot = Hop {
        from: None,
        to: Language::PIVOT,
    };
    if target.is_pivot() {
        return vec![pivot];
    }
    vec![
        pivot,
        Hop {
            from: Some(Language::PIVOT),
            to: target,
        },
    ]
}

/// Translate `text` into `target`, routing through the pivot language when
/// the target is anything else.
pub fn run_translation(
    client: &dyn GenerationClient,
    model: &str,
    text: &str,
    target: Language,
) -> PipelineOutcome {
    let mut current = text.to_string();
    let mut raw_outputs: Vec<String> = Vec::new();
    let mut recovery = Recovery::Clean;

    for hop in translation_hops(target) {
        let label = hop_label(hop.from, hop.to);
        let request = ChatRequest {
            model: model.to_string(),
            system_prompt: translation_prompt(hop.to),
            user_text: current.clone(),
            params: TRANSLATION_PARAMS,
        };
        let normalized = client.complete_chat(&request).and_then(|raw| {
            raw_outputs.push(raw.clone());
            normalize_translation(&raw)
        });
        match normalized {
            Ok(normalized) => {
                if normalized.fallback_used() {
                    recovery = Recovery::Fallback;
                }
                current = normalized.value;
            }
            Err(err) => {
                log_failure("translation", &label, &err);
                let raw = joined_raw(&raw_outputs);
                let failure = Failure::from(err).with_stage(&label).with_raw(raw.clone());
                return PipelineOutcome::failed(failure, raw);
            }
        }
    }

    PipelineOutcome::completed(
        Completion {
            result: NormalizedResult::Translation(current),
            recovery,
        },
        joined_raw(&raw_outputs),
    )
}

pub fn run_emotion(client: &dyn GenerationClient, model: &str, text: &str) -> PipelineOutcome {
    let request = ChatRequest {
        model: model.to_string(),
        system_prompt: emotion_prompt().to_string(),
        user_text: text.to_string(),
        params: EMOTION_PARAMS,
    };
    let raw = match client.complete_chat(&request) {
        Ok(raw) => raw,
        Err(err) => {
            log_failure("emotion", "extraction", &err);
            return PipelineOutcome::failed(Failure::from(err), None);
        }
    };
    match normalize_emotions(&raw) {
        Ok(normalized) => PipelineOutcome::completed(
            Completion {
                result: NormalizedResult::EmotionClues(normalized.value),
                recovery: normalized.recovery,
            },
            Some(raw),
        ),
        Err(err) => {
            log_failure("emotion", "extraction", &err);
            PipelineOutcome::failed(Failure::from(err), Some(raw))
        }
    }
}

pub fn run_images(client: &dyn GenerationClient, model: &str, prompt: &str) -> PipelineOutcome {
    let request = ImageRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        params: IMAGE_PARAMS,
    };
    match client.generate_images(&request) {
        Ok(urls) => {
            if urls.is_empty() {
                tracing::info!("image generation returned no images");
            }
            PipelineOutcome::completed(Completion::clean(NormalizedResult::ImageSet(urls)), None)
        }
        Err(err) => {
            log_failure("image", "generation", &err);
            PipelineOutcome::failed(Failure::from(err), None)
        }
    }
}

fn joined_raw(outputs: &[String]) -> Option<String> {
    if outputs.is_empty() {
        return None;
    }
    Some(outputs.join(&format!("\n{HOP_SEPARATOR}\n")))
}

fn log_failure(capability: &str, stage: &str, err: &GenerationError) {
    match err {
        GenerationError::ProviderDeclined { .. } => {
            tracing::warn!(capability, stage, "provider declined the request");
        }
        GenerationError::Transport(_) | GenerationError::MalformedResponse { .. } => {
            tracing::warn!(capability, stage, error = %err, "generation failed");
        }
    }
}
