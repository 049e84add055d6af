use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error(
        "API key not found for {provider}. Set {env_var} environment variable or add to config."
    )]
    MissingApiKey { provider: String, env_var: String },

    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Server overloaded (HTTP 503): {message}")]
    ServerOverloaded { message: String },

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid model preset: {0}")]
    InvalidPreset(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML error: {0}")]
    Toml(String),
}

impl LlmError {
    /// Whether the failure belongs to the rate-limit class and may succeed
    /// if the same request is sent again after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::ServerOverloaded { .. }
        )
    }

    /// Server-suggested wait before retrying, when one was given.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        LlmError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for LlmError {
    fn from(err: toml::de::Error) -> Self {
        LlmError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for LlmError {
    fn from(err: toml::ser::Error) -> Self {
        LlmError::Toml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited { retry_after: None }.is_transient());
        assert!(
            LlmError::ServerOverloaded {
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(
            !LlmError::ApiError {
                message: "bad request".into(),
                status_code: Some(400)
            }
            .is_transient()
        );
        assert!(!LlmError::ConfigError("x".into()).is_transient());
    }

    #[test]
    fn test_rate_limit_message() {
        let err = LlmError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded. Retry after 30 seconds");
        assert_eq!(err.retry_after(), Some(30));
    }
}
