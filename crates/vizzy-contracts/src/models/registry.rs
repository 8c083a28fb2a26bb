use indexmap::IndexMap;

pub const HUGGINGFACE_PROVIDER: &str = "huggingface";
pub const REPLICATE_PROVIDER: &str = "replicate";
pub const OPENROUTER_PROVIDER: &str = "openrouter";

/// Stand-in for the inference API's own default text-to-image model.
pub const HUGGINGFACE_DEFAULT_MODEL: &str = "stabilityai/stable-diffusion-2-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    /// Short human label used in provider labels, e.g. `FLUX.1-schnell`.
    pub label: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    /// Models served by `provider`, in declaration order.
    pub fn by_provider(&self, provider: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.provider == provider)
            .cloned()
            .collect()
    }

    /// First model of `provider` that supports `capability`.
    pub fn first_for(&self, provider: &str, capability: &str) -> Option<ModelSpec> {
        self.models
            .values()
            .find(|model| model.provider == provider && model.supports(capability))
            .cloned()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, label: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                label: label.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    // Free-tier candidates, tried in this order.
    insert(
        "stabilityai/stable-diffusion-xl-base-1.0",
        HUGGINGFACE_PROVIDER,
        "stable-diffusion-xl-base-1.0",
        &["image"],
    );
    insert(
        "black-forest-labs/FLUX.1-schnell",
        HUGGINGFACE_PROVIDER,
        "FLUX.1-schnell",
        &["image"],
    );
    insert(
        "prithivMLand/Consistent_ID_ComfyUI",
        HUGGINGFACE_PROVIDER,
        "Consistent_ID_ComfyUI",
        &["image"],
    );
    insert(
        HUGGINGFACE_DEFAULT_MODEL,
        HUGGINGFACE_PROVIDER,
        "default",
        &["image"],
    );
    insert(
        "black-forest-labs/flux-schnell",
        REPLICATE_PROVIDER,
        "Flux Schnell",
        &["image"],
    );
    insert(
        "black-forest-labs/flux-pro",
        OPENROUTER_PROVIDER,
        "Flux",
        &["image"],
    );
    insert("openrouter/auto", OPENROUTER_PROVIDER, "auto", &["text"]);

    map
}
