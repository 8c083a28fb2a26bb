use std::error::Error as _;

use reqwest::{RequestBuilder, Response};
use tracing::warn;

use crate::config::RetryPolicy;

/// Upper bound for provider error detail carried in errors and logs.
pub(crate) const ERROR_SNIPPET_CHARS: usize = 200;

/// Sends the request built by `build`, re-issuing it after a timeout until the
/// policy's attempts run out. The last error is returned as-is.
pub(crate) async fn send_with_timeout_retries<F>(
    label: &str,
    policy: &RetryPolicy,
    mut build: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match build().timeout(policy.timeout).send().await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_timeout() && attempt < attempts => {
                warn!("{label} timeout, retry {attempt}/{attempts}");
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Reads a failed response into `(status, truncated body)`.
pub(crate) async fn error_snippet(response: Response) -> (u16, String) {
    let code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (code, truncate_text(body.trim(), ERROR_SNIPPET_CHARS))
}

pub(crate) fn error_chain_text(err: &reqwest::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        source = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

/// Truncates to at most `max_chars` characters, ellipsis included.
pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    value.chars().take(max_chars - 1).collect::<String>() + "…"
}

pub(crate) fn short_prompt(prompt: &str) -> String {
    truncate_text(prompt, 50)
}
