//! Error types and handling for testgen core

use crate::registry::ProviderKind;
use thiserror::Error;

/// Result type alias for testgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for testgen core
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an unusable request
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Vendor call failures
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Prompt template registration errors
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Prompt rendering errors
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller rather than by the system
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Code is required")]
    EmptyCode,

    #[error("Unsupported model: {value}")]
    UnknownModel { value: String },

    #[error("Unsupported test framework: {value}")]
    UnknownFramework { value: String },

    #[error("Unsupported code type: {value}")]
    UnknownCodeType { value: String },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing API key for {provider}: set {env_var} or providers.{provider}.api_key")]
    MissingApiKey {
        provider: ProviderKind,
        env_var: &'static str,
    },

    #[error("Model not registered: {model}")]
    UnknownModel { model: String },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Model {model} belongs to {expected}, but the {actual} client was selected")]
    ProviderMismatch {
        model: String,
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

/// Vendor call errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {hint} ({message})")]
    Transport {
        provider: ProviderKind,
        hint: TransportHint,
        message: String,
    },

    #[error("{provider} returned no usable text or tool call")]
    EmptyResponse { provider: ProviderKind },

    #[error("{provider} returned an unexpected content block type: {content_type}")]
    UnexpectedContentType {
        provider: ProviderKind,
        content_type: String,
    },

    #[error("{provider} kept requesting tools after {limit} round trip(s)")]
    ToolRoundTripsExceeded { provider: ProviderKind, limit: usize },

    #[error("{provider} sent a malformed payload: {message}")]
    MalformedPayload {
        provider: ProviderKind,
        message: String,
    },
}

/// What the caller should look at when a vendor call fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportHint {
    #[error("invalid API key, check the {env_var} configuration")]
    Authentication { env_var: &'static str },

    #[error("rate limit exceeded, please try again later")]
    RateLimit,

    #[error("model {model} is not available, check that you have access to it or try a different model")]
    ModelUnavailable { model: String },

    #[error("request timed out")]
    Timeout,

    #[error("network failure")]
    Network,

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },
}

impl ProviderError {
    /// Classify a non-success vendor response
    pub fn from_status(provider: ProviderKind, model: &str, status: u16, body: String) -> Self {
        let hint = if body.contains("No Inference Provider available") {
            TransportHint::ModelUnavailable {
                model: model.to_string(),
            }
        } else {
            match status {
                401 | 403 => TransportHint::Authentication {
                    env_var: provider.api_key_env(),
                },
                429 => TransportHint::RateLimit,
                503 if provider == ProviderKind::HuggingFace => TransportHint::ModelUnavailable {
                    model: model.to_string(),
                },
                _ => TransportHint::Status { status },
            }
        };

        ProviderError::Transport {
            provider,
            hint,
            message: format!("HTTP {}: {}", status, body.trim()),
        }
    }

    /// Classify a failure that happened before a response arrived
    pub fn from_reqwest(provider: ProviderKind, err: reqwest::Error) -> Self {
        let hint = if err.is_timeout() {
            TransportHint::Timeout
        } else if let Some(status) = err.status() {
            TransportHint::Status {
                status: status.as_u16(),
            }
        } else {
            TransportHint::Network
        };

        ProviderError::Transport {
            provider,
            hint,
            message: err.to_string(),
        }
    }

    /// The hint attached to a transport failure, if any
    pub fn hint(&self) -> Option<&TransportHint> {
        match self {
            ProviderError::Transport { hint, .. } => Some(hint),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_carries_api_key_hint() {
        let err = ProviderError::from_status(
            ProviderKind::OpenAI,
            "gpt-4",
            401,
            r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string(),
        );

        assert_eq!(
            err.hint(),
            Some(&TransportHint::Authentication {
                env_var: "OPENAI_API_KEY"
            })
        );
        let message = err.to_string();
        assert!(message.contains("API key"), "message was: {}", message);
        assert!(message.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = ProviderError::from_status(
            ProviderKind::Anthropic,
            "claude-3-5-sonnet-latest",
            429,
            "slow down".to_string(),
        );
        assert_eq!(err.hint(), Some(&TransportHint::RateLimit));
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_inference_backend_missing_is_availability_problem() {
        let err = ProviderError::from_status(
            ProviderKind::HuggingFace,
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            400,
            "No Inference Provider available for model".to_string(),
        );
        assert_eq!(
            err.hint(),
            Some(&TransportHint::ModelUnavailable {
                model: "Qwen/Qwen2.5-Coder-32B-Instruct".to_string()
            })
        );
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn test_other_status_is_reported_verbatim() {
        let err =
            ProviderError::from_status(ProviderKind::OpenAI, "gpt-4", 502, "bad gateway".into());
        assert_eq!(err.hint(), Some(&TransportHint::Status { status: 502 }));
        assert!(err.to_string().contains("HTTP 502: bad gateway"));
    }

    #[test]
    fn test_empty_code_message() {
        let err: Error = ValidationError::EmptyCode.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Code is required");
    }
}
