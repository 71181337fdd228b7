/// Failures surfaced by the chat adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// A required setting is absent or blank.
    MissingSetting(String),
    /// The resolved endpoint is not a valid URL.
    InvalidEndpoint { endpoint: String, reason: String },
    /// The settings provider could not be read.
    Settings(String),
    /// DNS, connect, timeout, or body read failure.
    Transport { endpoint: String, cause: String },
    /// Non-200 response that did not qualify for a retry.
    Api {
        status: u16,
        endpoint: String,
        body: String,
    },
    /// Success response with no recoverable reply text.
    Parse { reason: String, body: String },
}

impl AiError {
    /// HTTP status reported by the backend, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body carried for diagnostics, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            AiError::Api { body, .. } | AiError::Parse { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AiError::MissingSetting(key) => {
                write!(f, "AI setting '{}' is not configured", key)
            }
            AiError::InvalidEndpoint { endpoint, reason } => {
                write!(f, "Invalid AI endpoint '{}': {}", endpoint, reason)
            }
            AiError::Settings(msg) => {
                write!(f, "Failed to read AI settings: {}", msg)
            }
            AiError::Transport { endpoint, cause } => {
                write!(f, "AI request to {} failed: {}", endpoint, cause)
            }
            AiError::Api {
                status,
                endpoint,
                body,
            } => write!(
                f,
                "AI request to {} failed with status {}: {}",
                endpoint, status, body
            ),
            AiError::Parse { reason, body } => {
                write!(f, "Failed to parse AI response ({}): {}", reason, body)
            }
        }
    }
}

impl std::error::Error for AiError {}
