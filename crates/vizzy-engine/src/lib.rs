//! Generation engine: text completions, the image provider fallback chain and
//! deterministic placeholder images.

pub mod config;
mod http;
pub mod orchestrator;
pub mod placeholder;
pub mod providers;
pub mod text;

pub use config::{DotEnv, EngineConfig, RetryPolicy};
pub use orchestrator::{GenerationOrchestrator, TurnOutcome, DEFAULT_CAPTION};
pub use providers::{default_provider_chain, ImageProvider, ProviderChain};
pub use text::{OpenRouterTextClient, TextGenerator};
