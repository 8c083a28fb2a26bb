mod registry;

pub use registry::{
    ModelRegistry, ModelSpec, HUGGINGFACE_DEFAULT_MODEL, HUGGINGFACE_PROVIDER,
    OPENROUTER_PROVIDER, REPLICATE_PROVIDER,
};
