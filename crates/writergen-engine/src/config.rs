use std::fmt;
use std::time::Duration;

use thiserror::Error;
use writergen_contracts::models::{ModelSelectionError, ModelSelector};
use writergen_contracts::CapabilityKind;

pub const DEFAULT_API_BASE: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_POLL_SECS: u64 = 5;
pub const MIN_POLL_SECS: u64 = 1;
pub const MAX_POLL_SECS: u64 = 30;

const API_KEY_VARS: [&str; 2] = ["WRITERGEN_API_KEY", "SILICONFLOW_API_KEY"];
const API_BASE_VAR: &str = "SILICONFLOW_API_BASE";
const POLL_SECS_VAR: &str = "WRITERGEN_VIDEO_POLL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no API credential configured; set WRITERGEN_API_KEY or SILICONFLOW_API_KEY")]
    MissingCredential,
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error(transparent)]
    ModelSelection(#[from] ModelSelectionError),
}

/// Model identifiers resolved for each capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityModels {
    pub translation: String,
    pub emotion: String,
    pub image: String,
    pub video: String,
}

impl CapabilityModels {
    pub fn for_capability(&self, capability: CapabilityKind) -> &str {
        match capability {
            CapabilityKind::Translation => &self.translation,
            CapabilityKind::Emotion => &self.emotion,
            CapabilityKind::Image => &self.image,
            CapabilityKind::Video => &self.video,
        }
    }
}

/// Settings resolved once at start-up and handed to the client.
#[derive(Clone)]
pub struct EngineConfig {
    api_key: String,
    pub api_base: String,
    pub poll_interval: Duration,
    pub models: CapabilityModels,
}

impl EngineConfig {
    /// Read a `.env` file if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, ".env file could not be loaded");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = API_KEY_VARS
            .into_iter()
            .find_map(&value)
            .ok_or(ConfigError::MissingCredential)?;

        let api_base = value(API_BASE_VAR)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_secs = match value(POLL_SECS_VAR) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: POLL_SECS_VAR.to_string(),
                    reason: format!("expected whole seconds, got '{raw}'"),
                })?
                .clamp(MIN_POLL_SECS, MAX_POLL_SECS),
            None => DEFAULT_POLL_SECS,
        };

        let selector = ModelSelector::default();
        let pick = |capability: CapabilityKind, key: &str| {
            selector
                .select(value(key).as_deref(), capability)
                .map(|selection| selection.model.name)
        };
        let models = CapabilityModels {
            translation: pick(CapabilityKind::Translation, "WRITERGEN_TRANSLATION_MODEL")?,
            emotion: pick(CapabilityKind::Emotion, "WRITERGEN_EMOTION_MODEL")?,
            image: pick(CapabilityKind::Image, "WRITERGEN_IMAGE_MODEL")?,
            video: pick(CapabilityKind::Video, "WRITERGEN_VIDEO_MODEL")?,
        };

        Ok(Self {
            api_key,
            api_base,
            poll_interval: Duration::from_secs(poll_secs),
            models,
        })
    }

    /// Config for a known key, with every other setting at its default.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        Self::from_lookup(|key| (key == API_KEY_VARS[0]).then(|| api_key.clone()))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("poll_interval", &self.poll_interval)
            .field("models", &self.models)
            .finish()
    }
}
