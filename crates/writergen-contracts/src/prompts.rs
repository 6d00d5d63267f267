use serde::Serialize;

use crate::capability::Language;

/// Sampling parameters sent with a chat completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

pub const TRANSLATION_PARAMS: ChatParams = ChatParams {
    temperature: 0.5,
    max_tokens: 800,
};

pub const EMOTION_PARAMS: ChatParams = ChatParams {
    temperature: 0.5,
    max_tokens: 64,
};

/// Fixed parameters for one image generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageParams {
    pub image_size: &'static str,
    pub batch_size: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
}

pub const IMAGE_PARAMS: ImageParams = ImageParams {
    image_size: "1024x1024",
    batch_size: 3,
    num_inference_steps: 20,
    guidance_scale: 7.5,
};

pub const VIDEO_SIZE: &str = "1280x720";
pub const VIDEO_NEGATIVE_PROMPT: &str = "blurry, distorted faces, watermark, text overlay, low quality";

/// System prompt for a single translation hop into `target`.
///
/// The pivot hop and the final hop share the same wording; only the language
/// changes. Both demand a minified `{"translation": "..."}` object and name
/// the `ERROR` sentinel.
pub fn translation_prompt(target: Language) -> String {
    let name = target.name();
    format!(
        "You are a professional translator and literary author. Translate the following \
         text to {name}. Your response MUST be in {name} only and must not repeat words \
         from the original text. If you cannot translate the text fully into {name}, \
         respond with {{\"translation\": \"ERROR\"}}. Otherwise respond ONLY with one \
         valid minified JSON object: {{\"translation\": \"...\"}}. Do not add commentary, \
         markdown, code fences or additional objects."
    )
}

pub fn emotion_prompt() -> &'static str {
    "You are an expert literary emotion analyst. Read the following text and name the \
     core emotions together with any underlying or hidden ones (emotions only, not moods, \
     phrases or situations). Respond ONLY with one valid minified JSON array of 3-7 \
     single-word emotions, written in the language of the text or in English when that \
     is not possible. Do not add commentary, markdown, code fences or objects. If you \
     cannot comply, respond with [\"ERROR\"]."
}

/// Human-readable label for one hop of a translation, used in failure messages.
pub fn hop_label(from: Option<Language>, to: Language) -> String {
    match from {
        Some(from) => format!("{} → {}", from.name(), to.name()),
        None => format!("source → {}", to.name()),
    }
}
