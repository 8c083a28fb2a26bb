//! Drives one chat turn: intent classification, the image fallback chain and
//! the caption, plus the image-less conversational reply.
//!
//! Nothing in here returns an error to the caller. Provider and text
//! failures degrade to placeholder images, the fixed caption or a local
//! reply.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vizzy_contracts::models::ModelRegistry;
use vizzy_contracts::{
    parse_intent_payload, GenerationError, GenerationRequest, GenerationResult,
    IntentClassification, ProviderOutcome,
};

use crate::config::EngineConfig;
use crate::placeholder;
use crate::providers::{default_provider_chain, ProviderChain};
use crate::text::{OpenRouterTextClient, TextGenerator};

pub const DEFAULT_CAPTION: &str = "A beautiful creation from your imagination.";
pub const PLACEHOLDER_CHAIN_LABEL: &str = "Placeholder (SVG - colored by prompt)";
/// Reported as the image model for turns that produced no images.
pub const NO_IMAGE_MODEL: &str = "none";

const OFFLINE_CHAT_REPLY: &str =
    "I can help with image ideas and copy. What would you like to create?";
const CHAT_PERSONA: &str = "You are Vizzy Chat, a helpful, friendly creative assistant. \
Respond conversationally and concisely. If unsure about user intent, ask a clarifying question.";

/// Everything the HTTP layer needs to answer one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub images: Vec<String>,
    pub intent_category: String,
    pub image_model: String,
}

pub struct GenerationOrchestrator {
    text: Arc<dyn TextGenerator>,
    providers: ProviderChain,
    max_images: usize,
}

impl GenerationOrchestrator {
    pub fn new(text: Arc<dyn TextGenerator>, providers: ProviderChain, max_images: usize) -> Self {
        Self {
            text,
            providers,
            max_images: max_images.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let models = ModelRegistry::default();
        Self::new(
            Arc::new(OpenRouterTextClient::new(config, &models)),
            default_provider_chain(config, &models),
            config.max_images_per_request,
        )
    }

    pub fn text_model(&self) -> &str {
        self.text.model()
    }

    /// Walks the provider chain in order and returns the first live result.
    ///
    /// `count` is clamped to `1..=max_images`. When no provider produces a
    /// live image the result is exactly `count` placeholders.
    pub async fn generate_images(&self, prompt: &str, count: usize) -> GenerationResult {
        let request = match GenerationRequest::new(prompt, count, self.max_images) {
            Ok(request) => request,
            Err(err) => {
                warn!("Skipping image providers: {err}");
                let count = count.clamp(1, self.max_images);
                return GenerationResult::placeholder(
                    placeholder::synthesize(count, prompt),
                    PLACEHOLDER_CHAIN_LABEL,
                );
            }
        };

        for provider in self.providers.providers() {
            let name = provider.name();
            let attempt = request.clamped_to(provider.max_images());
            debug!(provider = name, count = attempt.count, "Attempting image provider");
            match provider.generate(&attempt).await {
                Ok(outcome) if outcome.is_live_success() => {
                    if let ProviderOutcome::Success(result) = outcome {
                        info!(
                            provider = name,
                            "Generated {} images via {}",
                            result.images.len(),
                            result.provider_label
                        );
                        return result;
                    }
                }
                Ok(ProviderOutcome::Success(result)) => {
                    info!(provider = name, "Provider returned {}", result.provider_label);
                }
                Ok(outcome) => {
                    info!(provider = name, outcome = outcome.kind(), "Advancing to next provider");
                }
                Err(err) => {
                    warn!(provider = name, "Provider failed ({err}), advancing");
                }
            }
        }

        info!("Using SVG placeholder images (all providers exhausted)");
        GenerationResult::placeholder(
            placeholder::synthesize(request.count, &request.prompt),
            PLACEHOLDER_CHAIN_LABEL,
        )
    }

    pub async fn classify_intent(&self, message: &str) -> IntentClassification {
        let prompt = format!(
            "You are an AI art director. Analyze the user's request and:\n\
             1) return a JSON object with keys `intent` and `prompt` only.\n\
             User request: \"{message}\"\n\n\
             Respond with JSON only."
        );
        match self.text.complete(&prompt, 300, 0.7).await {
            Ok(text) => parse_intent_payload(&text, message),
            Err(err) => {
                log_text_failure("intent classification", &err);
                IntentClassification::fallback(message)
            }
        }
    }

    pub async fn generate_caption(&self, prompt: &str, category: &str) -> String {
        let request = format!(
            "Create a short, poetic one-liner (max 15 words) for this artwork.\n\
             Request: {prompt}\nIntent: {category}\nRespond with only the tagline."
        );
        match self.text.complete(&request, 60, 0.8).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => DEFAULT_CAPTION.to_string(),
            Err(err) => {
                log_text_failure("caption", &err);
                DEFAULT_CAPTION.to_string()
            }
        }
    }

    pub async fn chat_reply(&self, message: &str) -> String {
        let prompt = format!("{CHAT_PERSONA}\nUser: {message}");
        match self.text.complete(&prompt, 300, 0.7).await {
            Ok(text) => text.trim().to_string(),
            Err(err) if err.is_configuration() => {
                warn!("Text backend not configured; returning local chat reply");
                OFFLINE_CHAT_REPLY.to_string()
            }
            Err(err) => {
                log_text_failure("chat reply", &err);
                local_chat_reply(message)
            }
        }
    }

    /// One full turn. `num_images == 0` is a text-only conversation turn.
    pub async fn respond(&self, message: &str, num_images: usize) -> TurnOutcome {
        if num_images == 0 {
            return TurnOutcome {
                reply: self.chat_reply(message).await,
                images: Vec::new(),
                intent_category: IntentClassification::chat(message).category,
                image_model: NO_IMAGE_MODEL.to_string(),
            };
        }

        let intent = self.classify_intent(message).await;
        let generated = self
            .generate_images(&intent.rewritten_prompt, num_images)
            .await;
        let reply = self.generate_caption(message, &intent.category).await;
        TurnOutcome {
            reply,
            images: generated.images,
            intent_category: intent.category,
            image_model: generated.provider_label,
        }
    }
}

fn log_text_failure(task: &str, err: &GenerationError) {
    if err.is_configuration() {
        debug!("Skipping {task}: {err}");
    } else {
        warn!("{task} failed: {err}");
    }
}

fn local_chat_reply(message: &str) -> String {
    let text = message.trim().to_lowercase();
    if ["summarize", "explain", "what is", "what's"]
        .iter()
        .any(|keyword| text.contains(keyword))
    {
        return "Vizzy Chat is a conversational AI creative assistant that helps you generate \
                images, write content, and explore creative ideas through visual brainstorming. \
                Would you like me to help you create something specific?"
            .to_string();
    }
    if text.contains('?')
        || ["how", "why", "when", "where", "who", "what"]
            .iter()
            .any(|word| text.contains(word))
    {
        return format!(
            "That's an interesting question about '{message}'. I'd love to help! Vizzy Chat can \
             generate images, write creative copy, or discuss ideas. What would you like to \
             explore today?"
        );
    }
    format!(
        "Thanks for sharing '{message}' with me. I can help you create visuals, write content, \
         or brainstorm ideas. What sounds interesting to you?"
    )
}
