use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, error};
use vizzy_contracts::models::{ModelRegistry, OPENROUTER_PROVIDER};
use vizzy_contracts::GenerationError;

use crate::config::{EngineConfig, RetryPolicy};
use crate::http::{
    error_chain_text, error_snippet, send_with_timeout_retries, ERROR_SNIPPET_CHARS,
};

const DEFAULT_TEXT_MODEL: &str = "openrouter/auto";
const MAX_COMPLETION_TOKENS: u32 = 500;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier reported to clients as `llm_model`.
    fn model(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}

/// Chat-completions client for OpenRouter.
pub struct OpenRouterTextClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    policy: RetryPolicy,
    http: HttpClient,
}

impl OpenRouterTextClient {
    pub fn new(config: &EngineConfig, models: &ModelRegistry) -> Self {
        Self {
            api_base: config.openrouter_api_base.clone(),
            api_key: config.openrouter_api_key.clone(),
            model: models
                .first_for(OPENROUTER_PROVIDER, "text")
                .map(|spec| spec.name)
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            policy: config.text_retry,
            http: HttpClient::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn payload(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens.min(MAX_COMPLETION_TOKENS),
            "temperature": temperature.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterTextClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("OpenRouter text completion skipped: no credential configured");
            return Err(GenerationError::configuration(
                "OPENROUTER_API_KEY not set",
            ));
        };

        let endpoint = self.endpoint();
        let payload = self.payload(prompt, max_tokens, temperature);
        let response = send_with_timeout_retries("OpenRouter", &self.policy, || {
            self.http
                .post(&endpoint)
                .bearer_auth(api_key)
                .header(CONTENT_TYPE, "application/json")
                .json(&payload)
        })
        .await
        .map_err(|err| {
            let detail = error_chain_text(&err, ERROR_SNIPPET_CHARS);
            error!(model = %self.model, "OpenRouter text completion failed: {detail}");
            GenerationError::transient(detail)
        })?;

        if !response.status().is_success() {
            let (code, snippet) = error_snippet(response).await;
            error!(model = %self.model, "OpenRouter API error: {code} - {snippet}");
            return Err(GenerationError::provider(Some(code), snippet));
        }

        let code = response.status().as_u16();
        let data: Value = response.json().await.map_err(|err| {
            GenerationError::provider(
                Some(code),
                format!(
                    "invalid JSON payload: {}",
                    error_chain_text(&err, ERROR_SNIPPET_CHARS)
                ),
            )
        })?;
        let text = data
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::provider(None, "empty response"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use vizzy_contracts::models::ModelSpec;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer, key: Option<&str>) -> OpenRouterTextClient {
        let config = EngineConfig {
            openrouter_api_key: key.map(str::to_string),
            openrouter_api_base: server.uri(),
            text_retry: RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(200)),
            ..EngineConfig::default()
        };
        OpenRouterTextClient::new(&config, &ModelRegistry::default())
    }

    #[tokio::test]
    async fn missing_credential_is_a_configuration_error() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);
        let err = client.complete("hello", 10, 0.5).await.err();
        assert!(matches!(err, Some(GenerationError::Configuration { .. })));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn extracts_first_choice_content() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "openrouter/auto",
                "max_tokens": 500,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"content": "  Golden light spills over quiet peaks.  "}},
                    {"message": {"content": "second"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let text = client.complete("caption please", 900, 0.8).await?;
        assert_eq!(text, "Golden light spills over quiet peaks.");
        Ok(())
    }

    #[test]
    fn model_comes_from_the_registry_text_entry() {
        let config = EngineConfig::default();
        let default_client = OpenRouterTextClient::new(&config, &ModelRegistry::default());
        assert_eq!(default_client.model(), "openrouter/auto");

        let mut models = indexmap::IndexMap::new();
        models.insert(
            "meta-llama/llama-3.1-8b-instruct".to_string(),
            ModelSpec {
                name: "meta-llama/llama-3.1-8b-instruct".to_string(),
                provider: OPENROUTER_PROVIDER.to_string(),
                label: "llama".to_string(),
                capabilities: vec!["text".to_string()],
            },
        );
        let client = OpenRouterTextClient::new(&config, &ModelRegistry::new(Some(models)));
        assert_eq!(client.model(), "meta-llama/llama-3.1-8b-instruct");

        let image_only = ModelRegistry::new(Some(indexmap::IndexMap::new()));
        assert_eq!(
            OpenRouterTextClient::new(&config, &image_only).model(),
            DEFAULT_TEXT_MODEL
        );
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_truncated_body() {
        let server = MockServer::start().await;
        let body = "e".repeat(1000);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string(body))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        match client.complete("hi", 10, 0.7).await {
            Err(GenerationError::Provider { status, reason }) => {
                assert_eq!(status, Some(502));
                assert!(reason.chars().count() <= ERROR_SNIPPET_CHARS);
                assert!(reason.starts_with("eee"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_content_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "   "}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let err = client.complete("hi", 10, 0.7).await.err();
        assert_eq!(err, Some(GenerationError::provider(None, "empty response")));
    }

    #[tokio::test]
    async fn missing_choices_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "gen-1"})))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let err = client.complete("hi", 10, 0.7).await.err();
        assert!(matches!(err, Some(GenerationError::Provider { .. })));
    }

    #[tokio::test]
    async fn timeouts_retry_once_then_surface_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({"choices": [{"message": {"content": "late"}}]})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let err = client.complete("hi", 10, 0.7).await.err();
        assert!(matches!(err, Some(GenerationError::Transient { .. })));
    }
}
