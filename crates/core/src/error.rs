//! Error types for the tandem domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// HTTP statuses that are worth retrying with backoff.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 529];

/// The top-level error type for all tandem operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Host errors ---
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error ends a run because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Provider(ProviderError::Cancelled))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request never produced an HTTP status (DNS, connect, TLS, reset).
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Malformed framing or an explicit error event inside the stream.
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// The HTTP status carried by this error, if one was obtained.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Only HTTP failures with a status in [`RETRYABLE_STATUSES`] are retried.
    /// Failures without a status are never retried.
    pub fn is_retryable(&self) -> bool {
        self.status()
            .is_some_and(|s| RETRYABLE_STATUSES.contains(&s))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool '{tool_name}' timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied by user.")]
    PermissionDenied { tool_name: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported host operation: {0}")]
    Unsupported(String),
}

impl HostError {
    pub fn io(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        HostError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_status_and_body() {
        let err = Error::Provider(ProviderError::Http {
            status: 429,
            body: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503, 529] {
            let err = ProviderError::Http { status, body: String::new() };
            assert!(err.is_retryable(), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 504] {
            let err = ProviderError::Http { status, body: String::new() };
            assert!(!err.is_retryable(), "{status} should not be retryable");
        }
    }

    #[test]
    fn statusless_failures_are_not_retryable() {
        assert!(!ProviderError::Network("connection refused".into()).is_retryable());
        assert!(!ProviderError::Stream("overloaded".into()).is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
        assert_eq!(ProviderError::Network("x".into()).status(), None);
    }

    #[test]
    fn permission_denied_message() {
        let err = ToolError::PermissionDenied {
            tool_name: "run_command".into(),
        };
        assert_eq!(err.to_string(), "Permission denied by user.");
    }

    #[test]
    fn timeout_message_mentions_timeout() {
        let err = ToolError::Timeout {
            tool_name: "run_command".into(),
            timeout_secs: 30,
        };
        assert!(err.to_string().contains("timed out after 30s"));
    }

    #[test]
    fn cancelled_detection() {
        assert!(Error::from(ProviderError::Cancelled).is_cancelled());
        assert!(!Error::Internal("x".into()).is_cancelled());
    }
}
