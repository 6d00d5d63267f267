use thiserror::Error;

use super::registry::{ModelRegistry, ModelSpec};
use crate::capability::CapabilityKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no models available for capability '{capability}'")]
pub struct ModelSelectionError {
    pub capability: CapabilityKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Resolve `requested` for `capability`, falling back to the first
    /// catalog entry that supports it.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: CapabilityKind,
    ) -> Result<ModelSelection, ModelSelectionError> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(name) => {
                if let Some(model) = self.registry.ensure(name, capability) {
                    return Ok(ModelSelection {
                        model,
                        requested: Some(name.to_string()),
                        fallback_reason: None,
                    });
                }
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }
            None => "No model specified; using default.".to_string(),
        };

        let Some(model) = self.registry.by_capability(capability).into_iter().next() else {
            return Err(ModelSelectionError { capability });
        };
        if requested.is_some() {
            tracing::warn!(
                capability = capability.as_str(),
                model = model.name.as_str(),
                reason = fallback_reason.as_str(),
                "model selection fell back"
            );
        }
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}
