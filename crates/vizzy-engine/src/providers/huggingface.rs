use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde_json::json;
use tracing::{debug, info, warn};
use vizzy_contracts::models::{ModelRegistry, ModelSpec, HUGGINGFACE_PROVIDER};
use vizzy_contracts::{GenerationError, GenerationRequest, GenerationResult, ProviderOutcome};

use super::ImageProvider;
use crate::config::{EngineConfig, RetryPolicy};
use crate::http::{
    error_chain_text, error_snippet, send_with_timeout_retries, short_prompt, truncate_text,
};

const MAX_IMAGES: usize = 4;

/// Free-tier inference API. One call per image, several candidate models.
pub struct HuggingFaceProvider {
    api_base: String,
    api_key: Option<String>,
    models: Vec<ModelSpec>,
    policy: RetryPolicy,
    http: HttpClient,
}

impl HuggingFaceProvider {
    pub fn new(config: &EngineConfig, models: &ModelRegistry) -> Self {
        Self {
            api_base: config.huggingface_api_base.clone(),
            api_key: config.huggingface_api_key.clone(),
            models: models.by_provider(HUGGINGFACE_PROVIDER),
            policy: config.huggingface_retry,
            http: HttpClient::new(),
        }
    }

    pub fn with_models(mut self, models: Vec<ModelSpec>) -> Self {
        self.models = models;
        self
    }

    fn model_endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.api_base, model)
    }

    fn provider_label(model: &ModelSpec) -> String {
        format!("HuggingFace ({})", model.label)
    }

    async fn generate_one(
        &self,
        api_key: &str,
        model: &ModelSpec,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let endpoint = self.model_endpoint(&model.name);
        let payload = json!({ "inputs": prompt });
        let response = send_with_timeout_retries("HuggingFace", &self.policy, || {
            self.http
                .post(&endpoint)
                .bearer_auth(api_key)
                .header("accept", "image/png")
                .json(&payload)
        })
        .await
        .map_err(|err| GenerationError::transient(error_chain_text(&err, 100)))?;

        if !response.status().is_success() {
            let (code, snippet) = error_snippet(response).await;
            return Err(GenerationError::provider(Some(code), snippet));
        }

        let code = response.status().as_u16();
        let declared_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GenerationError::transient(error_chain_text(&err, 100)))?;
        if bytes.is_empty() {
            return Err(GenerationError::provider(Some(code), "empty image body"));
        }
        let mime = match declared_mime.filter(|mime| mime.starts_with("image/")) {
            Some(mime) => mime,
            None => image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .map_err(|_| {
                    GenerationError::provider(
                        Some(code),
                        format!(
                            "response was not an image: {}",
                            truncate_text(&String::from_utf8_lossy(&bytes), 100)
                        ),
                    )
                })?,
        };
        Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
    }
}

fn status_hint(status: u16) -> &'static str {
    match status {
        402 => "requires payment",
        403 => "forbidden access",
        410 => "discontinued",
        429 => "rate limited",
        503 => "model loading or unavailable",
        _ => "failed",
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        HUGGINGFACE_PROVIDER
    }

    fn max_images(&self) -> usize {
        MAX_IMAGES
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderOutcome, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("HUGGINGFACE_API_KEY not set, skipping free-tier provider");
            return Ok(ProviderOutcome::Unavailable(
                "HUGGINGFACE_API_KEY not set".to_string(),
            ));
        };
        let request = request.clamped_to(MAX_IMAGES);
        let mut failures = 0usize;
        let mut rate_limited = 0usize;

        for model in &self.models {
            info!(
                model = %model.name,
                prompt = %short_prompt(&request.prompt),
                "Attempting free-tier model"
            );
            let mut images = Vec::new();
            for idx in 0..request.count {
                match self.generate_one(api_key, model, &request.prompt).await {
                    Ok(image) => {
                        images.push(image);
                        info!(model = %model.name, "Generated image {}/{}", idx + 1, request.count);
                    }
                    Err(err) => {
                        failures += 1;
                        let hint = match &err {
                            GenerationError::Provider {
                                status: Some(code), ..
                            } => {
                                if *code == 429 {
                                    rate_limited += 1;
                                }
                                status_hint(*code)
                            }
                            _ => "failed",
                        };
                        warn!(
                            model = %model.name,
                            "Image {} {hint}: {}, continuing...",
                            idx + 1,
                            truncate_text(&err.to_string(), 100)
                        );
                    }
                }
            }

            if !images.is_empty() {
                let label = Self::provider_label(model);
                info!("Successfully generated {} images via {label}", images.len());
                return Ok(ProviderOutcome::Success(GenerationResult::live(
                    images,
                    label,
                    request.count,
                )));
            }
            warn!(model = %model.name, "No images generated, trying next model");
        }

        warn!("All HuggingFace models exhausted");
        if failures > 0 && failures == rate_limited {
            return Ok(ProviderOutcome::RateLimited);
        }
        Ok(ProviderOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tracing_subscriber::fmt::MakeWriter;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn model(name: &str, label: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: HUGGINGFACE_PROVIDER.to_string(),
            label: label.to_string(),
            capabilities: vec!["image".to_string()],
        }
    }

    fn provider_for(server: &MockServer, key: Option<&str>) -> HuggingFaceProvider {
        let config = EngineConfig {
            huggingface_api_key: key.map(str::to_string),
            huggingface_api_base: server.uri(),
            huggingface_retry: RetryPolicy::new(1, Duration::ZERO, Duration::from_secs(5)),
            ..EngineConfig::default()
        };
        HuggingFaceProvider::new(&config, &ModelRegistry::default()).with_models(vec![
            model("org/first", "first"),
            model("org/second", "second"),
        ])
    }

    /// Fails every other call, starting with the first.
    struct Alternating {
        calls: Arc<AtomicUsize>,
    }

    impl Respond for Alternating {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 0 {
                ResponseTemplate::new(500).set_body_string("boom")
            } else {
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(PNG_MAGIC.to_vec())
            }
        }
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let provider = provider_for(&server, None);
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 2, 4)?)
            .await?;
        assert!(matches!(outcome, ProviderOutcome::Unavailable(_)));
        Ok(())
    }

    #[tokio::test]
    async fn per_image_failures_are_skipped_and_partial_result_returned() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("POST"))
            .and(path("/models/org/first"))
            .and(header("authorization", "Bearer hf-test"))
            .respond_with(Alternating {
                calls: Arc::clone(&calls),
            })
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/org/second"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_MAGIC.to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("hf-test"));
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 3, 4)?)
            .await?;
        let result = match outcome {
            ProviderOutcome::Success(result) => result,
            other => panic!("expected success, got {other:?}"),
        };
        // calls 0 and 2 fail, call 1 succeeds
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.provider_label, "HuggingFace (first)");
        assert!(!result.is_placeholder);
        assert!(result.images[0].starts_with("data:image/png;base64,"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn advances_to_next_model_when_one_yields_nothing() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/org/first"))
            .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/org/second"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(PNG_MAGIC.to_vec()),
            )
            .expect(2)
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("hf-test"));
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 2, 4)?)
            .await?;
        let result = match outcome {
            ProviderOutcome::Success(result) => result,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(result.images.len(), 2);
        assert_eq!(result.provider_label, "HuggingFace (second)");
        // sniffed from magic bytes when content-type is not an image type
        assert!(result.images[0].starts_with("data:image/png;base64,"));
        Ok(())
    }

    /// In-memory log sink for asserting on emitted levels.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut sink) = self.0.lock() {
                sink.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn every_model_failing_is_exhausted() -> anyhow::Result<()> {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("payment required"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("hf-test"));
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 1, 4)?)
            .await?;
        assert_eq!(outcome, ProviderOutcome::Exhausted);

        let lines = logs.lines();
        let exhausted: Vec<&String> = lines
            .iter()
            .filter(|line| line.contains("All HuggingFace models exhausted"))
            .collect();
        assert_eq!(exhausted.len(), 1);
        assert!(exhausted[0].contains("WARN"));
        assert!(!lines.iter().any(|line| line.contains("ERROR")));
        Ok(())
    }

    #[tokio::test]
    async fn only_rate_limits_report_rate_limited() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("hf-test"));
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 1, 4)?)
            .await?;
        assert_eq!(outcome, ProviderOutcome::RateLimited);
        Ok(())
    }

    #[tokio::test]
    async fn count_is_clamped_to_provider_maximum() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/org/first"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_MAGIC.to_vec()))
            .expect(4)
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("hf-test"));
        let outcome = provider
            .generate(&GenerationRequest::new("boat", 9, 9)?)
            .await?;
        let result = match outcome {
            ProviderOutcome::Success(result) => result,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(result.images.len(), 4);
        Ok(())
    }
}
