use thiserror::Error;

/// Failures raised by text and image backends.
///
/// None of these reach an end user: the orchestrator absorbs them and
/// degrades to placeholder images, the default caption or a local chat reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A backend credential is missing. Expected in offline/demo mode.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Network timeout or transport failure after the local retry budget.
    #[error("Transient error: {reason}")]
    Transient { reason: String },

    #[error("Provider error{}: {reason}", status_suffix(.status))]
    Provider { status: Option<u16>, reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl GenerationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn provider(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Provider {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },
}
