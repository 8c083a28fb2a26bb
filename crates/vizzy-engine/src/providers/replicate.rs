use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vizzy_contracts::models::{ModelRegistry, REPLICATE_PROVIDER};
use vizzy_contracts::{GenerationError, GenerationRequest, GenerationResult, ProviderOutcome};

use super::ImageProvider;
use crate::config::{EngineConfig, RetryPolicy};
use crate::http::{error_chain_text, error_snippet, short_prompt, ERROR_SNIPPET_CHARS};

const MAX_IMAGES: usize = 4;
const DEFAULT_MODEL: &str = "black-forest-labs/flux-schnell";
const DEFAULT_LABEL: &str = "Flux Schnell";

/// Credit-gated predictions API. One batched call; never raises.
pub struct ReplicateProvider {
    api_base: String,
    api_key: Option<String>,
    model: String,
    label: String,
    policy: RetryPolicy,
    poll_interval: Duration,
    http: HttpClient,
}

impl ReplicateProvider {
    pub fn new(config: &EngineConfig, models: &ModelRegistry) -> Self {
        let spec = models.first_for(REPLICATE_PROVIDER, "image");
        Self {
            api_base: config.replicate_api_base.clone(),
            api_key: config.replicate_api_key.clone(),
            model: spec
                .as_ref()
                .map(|spec| spec.name.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            label: spec
                .map(|spec| spec.label)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            policy: config.replicate_retry,
            poll_interval: config.replicate_poll_interval,
            http: HttpClient::new(),
        }
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/models/{}/predictions", self.api_base, self.model)
    }

    fn provider_label(&self) -> String {
        format!("Replicate ({})", self.label)
    }

    fn prediction_status(prediction: &Value) -> String {
        prediction
            .get("status")
            .and_then(Value::as_str)
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_default()
    }

    async fn read_prediction(
        &self,
        response: reqwest::Response,
    ) -> Result<Value, GenerationError> {
        if !response.status().is_success() {
            let (code, snippet) = error_snippet(response).await;
            return Err(GenerationError::provider(Some(code), snippet));
        }
        let code = response.status().as_u16();
        response.json::<Value>().await.map_err(|err| {
            GenerationError::provider(
                Some(code),
                format!(
                    "invalid JSON payload: {}",
                    error_chain_text(&err, ERROR_SNIPPET_CHARS)
                ),
            )
        })
    }

    /// Time left of the overall prediction budget; an error once it is spent.
    fn poll_budget_left(&self, started: Instant) -> Result<Duration, GenerationError> {
        let remaining = self.policy.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(GenerationError::transient(format!(
                "Replicate polling timed out after {:.1}s",
                self.policy.timeout.as_secs_f64()
            )));
        }
        Ok(remaining)
    }

    async fn poll_prediction(
        &self,
        poll_url: &str,
        api_key: &str,
        started: Instant,
    ) -> Result<Value, GenerationError> {
        loop {
            let remaining = self.poll_budget_left(started)?;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
            let remaining = self.poll_budget_left(started)?;
            let response = self
                .http
                .get(poll_url)
                .bearer_auth(api_key)
                .timeout(remaining)
                .send()
                .await
                .map_err(|err| {
                    GenerationError::transient(error_chain_text(&err, ERROR_SNIPPET_CHARS))
                })?;
            let prediction = self.read_prediction(response).await?;
            match Self::prediction_status(&prediction).as_str() {
                "succeeded" => return Ok(prediction),
                "failed" | "canceled" => {
                    return Err(GenerationError::provider(
                        None,
                        format!("Replicate prediction failed: {}", prediction_error(&prediction)),
                    ))
                }
                _ => debug!("Replicate prediction still running"),
            }
        }
    }

    /// Runs one prediction and returns its raw `output` field.
    async fn run_prediction(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<Value, GenerationError> {
        let endpoint = self.predictions_endpoint();
        let payload = json!({
            "input": {
                "prompt": request.prompt,
                "go_fast": true,
                "num_outputs": request.count,
                "aspect_ratio": "1:1",
                "output_format": "webp",
                "output_quality": 80,
            }
        });
        let started = Instant::now();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .header("Prefer", "wait")
            .timeout(self.policy.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GenerationError::transient(error_chain_text(&err, ERROR_SNIPPET_CHARS)))?;
        let mut prediction = self.read_prediction(response).await?;

        match Self::prediction_status(&prediction).as_str() {
            "succeeded" => {}
            "starting" | "processing" => {
                let poll_url = prediction
                    .get("urls")
                    .and_then(|urls| urls.get("get"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| {
                        GenerationError::provider(None, "Replicate prediction missing poll URL")
                    })?
                    .to_string();
                prediction = self.poll_prediction(&poll_url, api_key, started).await?;
            }
            _ => {
                return Err(GenerationError::provider(
                    None,
                    format!("Replicate prediction failed: {}", prediction_error(&prediction)),
                ))
            }
        }

        Ok(prediction.get("output").cloned().unwrap_or(Value::Null))
    }
}

fn prediction_error(prediction: &Value) -> String {
    prediction
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("status={}", ReplicateProvider::prediction_status(prediction)))
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    fn name(&self) -> &str {
        REPLICATE_PROVIDER
    }

    fn max_images(&self) -> usize {
        MAX_IMAGES
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderOutcome, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("REPLICATE_API_KEY not set, skipping credit-gated provider");
            return Ok(ProviderOutcome::Unavailable(
                "REPLICATE_API_KEY not set".to_string(),
            ));
        };
        let request = request.clamped_to(MAX_IMAGES);
        info!(
            model = %self.model,
            prompt = %short_prompt(&request.prompt),
            "Calling Replicate for {} images",
            request.count
        );

        let output = match self.run_prediction(api_key, &request).await {
            Ok(output) => output,
            Err(err) => {
                warn!(model = %self.model, "Replicate image generation failed: {err}");
                return Ok(ProviderOutcome::Exhausted);
            }
        };

        let Some(rows) = output.as_array() else {
            warn!("Replicate returned unexpected output format");
            return Ok(ProviderOutcome::Exhausted);
        };
        let images: Vec<String> = rows
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect();
        if images.is_empty() {
            warn!("Replicate returned no images");
            return Ok(ProviderOutcome::Exhausted);
        }

        info!("Successfully generated {} images from Replicate", images.len());
        Ok(ProviderOutcome::Success(GenerationResult::live(
            images,
            self.provider_label(),
            request.count,
        )))
    }
}
