use indexmap::IndexMap;

use crate::capability::CapabilityKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub capabilities: Vec<CapabilityKind>,
}

impl ModelSpec {
    pub fn supports(&self, capability: CapabilityKind) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Catalog of known models, in preference order per capability.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, capability: CapabilityKind) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: CapabilityKind) -> Option<ModelSpec> {
        self.get(name.trim())
            .filter(|model| model.supports(capability))
            .cloned()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, capabilities: &[CapabilityKind]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                capabilities: capabilities.to_vec(),
            },
        );
    };

    insert("deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B", &[CapabilityKind::Translation]);
    insert("deepseek-ai/DeepSeek-R1-0528-Qwen3-8B", &[CapabilityKind::Emotion]);
    insert("Qwen/Qwen2.5-7B-Instruct", &[CapabilityKind::Translation, CapabilityKind::Emotion]);
    insert("Kwai-Kolors/Kolors", &[CapabilityKind::Image]);
    insert("black-forest-labs/FLUX.1-schnell", &[CapabilityKind::Image]);
    insert("Wan-AI/Wan2.1-T2V-14B", &[CapabilityKind::Video]);
    insert("Wan-AI/Wan2.1-T2V-14B-Turbo", &[CapabilityKind::Video]);

    map
}
