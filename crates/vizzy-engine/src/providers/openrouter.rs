use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{info, warn};
use vizzy_contracts::models::{ModelRegistry, OPENROUTER_PROVIDER};
use vizzy_contracts::{GenerationError, GenerationRequest, GenerationResult, ProviderOutcome};

use super::ImageProvider;
use crate::config::{EngineConfig, RetryPolicy};
use crate::http::{
    error_chain_text, error_snippet, send_with_timeout_retries, short_prompt,
    ERROR_SNIPPET_CHARS,
};
use crate::placeholder;

const MAX_IMAGES: usize = 2;
const DEFAULT_MODEL: &str = "black-forest-labs/flux-pro";
const IMAGE_SIZE: &str = "512x512";
const PROVIDER_LABEL: &str = "OpenRouter Flux";
const NO_KEY_LABEL: &str = "Placeholder (no API key)";

/// Aggregator image endpoint, last in the chain.
///
/// Unlike the other adapters a non-timeout transport failure is returned as
/// `Err`; the orchestrator logs it and moves on.
pub struct OpenRouterImageProvider {
    api_base: String,
    api_key: Option<String>,
    model: String,
    policy: RetryPolicy,
    http: HttpClient,
}

impl OpenRouterImageProvider {
    pub fn new(config: &EngineConfig, models: &ModelRegistry) -> Self {
        Self {
            api_base: config.openrouter_api_base.clone(),
            api_key: config.openrouter_api_key.clone(),
            model: models
                .first_for(OPENROUTER_PROVIDER, "image")
                .map(|spec| spec.name)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            policy: config.openrouter_image_retry,
            http: HttpClient::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/images/generations", self.api_base)
    }
}

/// Accepts both bare URL strings and `{"url": ...}` objects.
fn image_urls(data: &Value) -> Vec<String> {
    data.get("images")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    row.as_str()
                        .or_else(|| row.get("url").and_then(Value::as_str))
                })
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ImageProvider for OpenRouterImageProvider {
    fn name(&self) -> &str {
        OPENROUTER_PROVIDER
    }

    fn max_images(&self) -> usize {
        MAX_IMAGES
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderOutcome, GenerationError> {
        let request = request.clamped_to(MAX_IMAGES);
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("OPENROUTER_API_KEY not set for image generation, using placeholders");
            return Ok(ProviderOutcome::Success(GenerationResult::placeholder(
                placeholder::synthesize(request.count, &request.prompt),
                NO_KEY_LABEL,
            )));
        };
        info!(
            model = %self.model,
            prompt = %short_prompt(&request.prompt),
            "Generating {} images via OpenRouter",
            request.count
        );

        let endpoint = self.endpoint();
        let payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "num_images": request.count,
            "size": IMAGE_SIZE,
            "response_format": "url",
        });
        let response = match send_with_timeout_retries("OpenRouter image", &self.policy, || {
            self.http
                .post(&endpoint)
                .bearer_auth(api_key)
                .header(CONTENT_TYPE, "application/json")
                .json(&payload)
        })
        .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!("OpenRouter image timeouts exhausted after {} attempts", self.policy.max_attempts());
                return Ok(ProviderOutcome::TransientFailure(error_chain_text(
                    &err,
                    ERROR_SNIPPET_CHARS,
                )));
            }
            Err(err) => {
                let detail = error_chain_text(&err, ERROR_SNIPPET_CHARS);
                warn!(model = %self.model, "OpenRouter image generation failed: {detail}");
                return Err(GenerationError::transient(detail));
            }
        };

        if !response.status().is_success() {
            let (code, snippet) = error_snippet(response).await;
            warn!(model = %self.model, "OpenRouter API error: {code} - {snippet}");
            return Ok(ProviderOutcome::Exhausted);
        }

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    "OpenRouter returned invalid JSON: {}",
                    error_chain_text(&err, ERROR_SNIPPET_CHARS)
                );
                return Ok(ProviderOutcome::Exhausted);
            }
        };
        let images = image_urls(&data);
        if images.len() < request.count {
            warn!(
                "OpenRouter returned {} of {} requested images",
                images.len(),
                request.count
            );
            return Ok(ProviderOutcome::Exhausted);
        }

        Ok(ProviderOutcome::Success(GenerationResult::live(
            images,
            PROVIDER_LABEL,
            request.count,
        )))
    }
}
