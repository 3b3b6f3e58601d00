use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the completion backend.
///
/// These never leave the completion client as errors; they are rendered into a
/// terminal `StreamEvent::Error` once retries are exhausted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Rate limited by the backend: {0}")]
    RateLimited(String),

    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Only rate limiting and connection failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::Connection(_)
        )
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimited(body.to_string())
        } else {
            ProviderError::Api {
                status: status.as_u16(),
                message: body.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            ProviderError::Connection(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status, &err.to_string())
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("Tool message answers unknown tool call: {0}")]
    UnknownToolCall(String),
}

/// Failures inside a tool implementation, folded into a `ToolResult` before
/// they reach the registry's caller.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
pub type ToolOutcome<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ProviderError::RateLimited("slow down".into()).is_transient());
        assert!(ProviderError::Connection("refused".into()).is_transient());
        assert!(!ProviderError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_transient());
        assert!(!ProviderError::ContextLengthExceeded("too long".into()).is_transient());
        assert!(!ProviderError::InvalidResponse("garbage".into()).is_transient());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, "later"),
            ProviderError::RateLimited(_)
        ));
        assert_eq!(
            ProviderError::from_status(StatusCode::BAD_REQUEST, "bad"),
            ProviderError::Api {
                status: 400,
                message: "bad".into()
            }
        );
    }
}
