//! Image-generation backends behind one contract.
//!
//! Adapters differ deliberately in how they treat failures:
//! - the free-tier adapter skips failed images and walks its model list,
//! - the credit-gated adapter converts every error into `Exhausted`,
//! - the aggregator adapter lets non-timeout transport errors escape.
//!
//! Each adapter clamps the requested count to its own maximum before calling
//! out.

mod huggingface;
mod openrouter;
mod replicate;

use async_trait::async_trait;
use vizzy_contracts::models::ModelRegistry;
use vizzy_contracts::providers::{NamedProvider, ProviderRegistry};
use vizzy_contracts::{GenerationError, GenerationRequest, ProviderOutcome};

use crate::config::EngineConfig;

pub use huggingface::HuggingFaceProvider;
pub use openrouter::OpenRouterImageProvider;
pub use replicate::ReplicateProvider;

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    fn max_images(&self) -> usize;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderOutcome, GenerationError>;
}

impl NamedProvider for Box<dyn ImageProvider> {
    fn name(&self) -> &str {
        ImageProvider::name(self.as_ref())
    }
}

/// Providers in fallback priority order.
pub type ProviderChain = ProviderRegistry<Box<dyn ImageProvider>>;

/// Free-tier, then credit-gated, then the aggregator.
pub fn default_provider_chain(config: &EngineConfig, models: &ModelRegistry) -> ProviderChain {
    ProviderRegistry::new(vec![
        Box::new(HuggingFaceProvider::new(config, models)) as Box<dyn ImageProvider>,
        Box::new(ReplicateProvider::new(config, models)),
        Box::new(OpenRouterImageProvider::new(config, models)),
    ])
}
