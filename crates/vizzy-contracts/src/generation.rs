use crate::error::GenerationError;

/// One image-generation call as seen by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub count: usize,
}

impl GenerationRequest {
    /// Builds a request, clamping `count` into `1..=max`.
    pub fn new(
        prompt: impl Into<String>,
        count: usize,
        max: usize,
    ) -> Result<Self, GenerationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest {
                reason: "prompt must not be empty".to_string(),
            });
        }
        Ok(Self {
            prompt,
            count: count.clamp(1, max.max(1)),
        })
    }

    /// Same prompt with `count` re-clamped to a provider maximum.
    pub fn clamped_to(&self, max: usize) -> Self {
        Self {
            prompt: self.prompt.clone(),
            count: self.count.clamp(1, max.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub images: Vec<String>,
    pub provider_label: String,
    pub is_placeholder: bool,
}

impl GenerationResult {
    /// Result from a live backend; never longer than `count`.
    pub fn live(mut images: Vec<String>, provider_label: impl Into<String>, count: usize) -> Self {
        images.truncate(count);
        Self {
            images,
            provider_label: provider_label.into(),
            is_placeholder: false,
        }
    }

    pub fn placeholder(images: Vec<String>, provider_label: impl Into<String>) -> Self {
        Self {
            images,
            provider_label: provider_label.into(),
            is_placeholder: true,
        }
    }

    pub fn has_live_images(&self) -> bool {
        !self.is_placeholder && !self.images.is_empty()
    }
}

/// What a single adapter call produced. Only the orchestrator looks at this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Success(GenerationResult),
    Unavailable(String),
    TransientFailure(String),
    RateLimited,
    Exhausted,
}

impl ProviderOutcome {
    pub fn is_live_success(&self) -> bool {
        matches!(self, Self::Success(result) if result.has_live_images())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Unavailable(_) => "unavailable",
            Self::TransientFailure(_) => "transient_failure",
            Self::RateLimited => "rate_limited",
            Self::Exhausted => "exhausted",
        }
    }
}
