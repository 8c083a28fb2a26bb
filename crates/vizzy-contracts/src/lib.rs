//! Shared data model for the Vizzy creative-assistant backend.
//!
//! Everything here is free of network I/O so the engine and the HTTP layer
//! agree on one vocabulary: generation requests and outcomes, the error
//! taxonomy, intent payload parsing, the model and provider registries and
//! the conversation session store.

pub mod error;
pub mod generation;
pub mod intent;
pub mod models;
pub mod providers;
pub mod sessions;

pub use error::{GenerationError, SessionError};
pub use generation::{GenerationRequest, GenerationResult, ProviderOutcome};
pub use intent::{parse_intent_payload, IntentClassification};
