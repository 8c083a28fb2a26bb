use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_HUGGINGFACE_API_BASE: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_MAX_IMAGES_PER_REQUEST: usize = 2;

/// Per-backend attempt budget. Only timeouts are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: usize, backoff: Duration, timeout: Duration) -> Self {
        Self {
            attempts,
            backoff,
            timeout,
        }
    }

    pub const fn text_completion() -> Self {
        Self::new(2, Duration::from_secs(1), Duration::from_secs(45))
    }

    pub const fn free_tier_image() -> Self {
        Self::new(1, Duration::ZERO, Duration::from_secs(45))
    }

    /// `timeout` doubles as the polling budget for queued predictions.
    pub const fn credit_gated_image() -> Self {
        Self::new(1, Duration::ZERO, Duration::from_secs(120))
    }

    pub const fn aggregator_image() -> Self {
        Self::new(2, Duration::from_secs(2), Duration::from_secs(45))
    }

    pub fn max_attempts(&self) -> usize {
        self.attempts.max(1)
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    pub openrouter_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub replicate_api_key: Option<String>,
    pub openrouter_api_base: String,
    pub huggingface_api_base: String,
    pub replicate_api_base: String,
    pub max_images_per_request: usize,
    pub text_retry: RetryPolicy,
    pub huggingface_retry: RetryPolicy,
    pub replicate_retry: RetryPolicy,
    pub replicate_poll_interval: Duration,
    pub openrouter_image_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            huggingface_api_key: None,
            replicate_api_key: None,
            openrouter_api_base: DEFAULT_OPENROUTER_API_BASE.to_string(),
            huggingface_api_base: DEFAULT_HUGGINGFACE_API_BASE.to_string(),
            replicate_api_base: DEFAULT_REPLICATE_API_BASE.to_string(),
            max_images_per_request: DEFAULT_MAX_IMAGES_PER_REQUEST,
            text_retry: RetryPolicy::text_completion(),
            huggingface_retry: RetryPolicy::free_tier_image(),
            replicate_retry: RetryPolicy::credit_gated_image(),
            replicate_poll_interval: Duration::from_secs(1),
            openrouter_image_retry: RetryPolicy::aggregator_image(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("openrouter_api_key", &redacted(&self.openrouter_api_key))
            .field("huggingface_api_key", &redacted(&self.huggingface_api_key))
            .field("replicate_api_key", &redacted(&self.replicate_api_key))
            .field("openrouter_api_base", &self.openrouter_api_base)
            .field("huggingface_api_base", &self.huggingface_api_base)
            .field("replicate_api_base", &self.replicate_api_base)
            .field("max_images_per_request", &self.max_images_per_request)
            .finish_non_exhaustive()
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

/// Variables read from a `.env` file. The process environment always wins
/// over values from the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DotEnv {
    vars: HashMap<String, String>,
}

impl DotEnv {
    /// `None` when the file is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .map(|content| Self::parse(&content))
    }

    /// `KEY=value` lines. Blank lines, `#` comments and an `export ` prefix
    /// are skipped; one layer of matching quotes is stripped.
    pub fn parse(content: &str) -> Self {
        let mut vars = HashMap::new();
        for raw_line in content.lines() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(stripped) = line.strip_prefix("export ") {
                line = stripped.trim();
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }
        Self { vars }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Process environment first, then the file.
    pub fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.vars.get(key).cloned())
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[0] == bytes[bytes.len() - 1]
    {
        return &value[1..value.len() - 1];
    }
    value
}

impl EngineConfig {
    /// Reads the process environment, falling back to `dotenv` per key.
    pub fn from_env(dotenv: &DotEnv) -> Self {
        Self::from_lookup(|key| dotenv.var(key))
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let api_base = |key: &str, default: &str| {
            value(key)
                .map(|raw| raw.trim_end_matches('/').to_string())
                .filter(|raw| !raw.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let defaults = Self::default();
        Self {
            openrouter_api_key: value("OPENROUTER_API_KEY"),
            huggingface_api_key: value("HUGGINGFACE_API_KEY"),
            replicate_api_key: value("REPLICATE_API_KEY").or_else(|| value("REPLICATE_API_TOKEN")),
            openrouter_api_base: api_base("OPENROUTER_API_BASE", DEFAULT_OPENROUTER_API_BASE),
            huggingface_api_base: api_base("HUGGINGFACE_API_BASE", DEFAULT_HUGGINGFACE_API_BASE),
            replicate_api_base: api_base("REPLICATE_API_BASE", DEFAULT_REPLICATE_API_BASE),
            max_images_per_request: value("VIZZY_MAX_IMAGES")
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|max| *max > 0)
                .unwrap_or(DEFAULT_MAX_IMAGES_PER_REQUEST),
            ..defaults
        }
    }

    pub fn text_configured(&self) -> bool {
        self.openrouter_api_key.is_some()
    }
}
