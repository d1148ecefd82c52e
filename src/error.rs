//! Error types for the research assistant.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while researching a topic.
///
/// Parse failures of the model reply are not errors: the recovery cascade
/// records them as [`crate::recovery::StageFailure`] values instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A research tool (web search, Wikipedia) failed
    #[error("{tool} error: {message}")]
    Tool { tool: String, message: String },

    /// The model endpoint call failed
    #[error("Model error: {0}")]
    Model(String),

    /// An external call exceeded its timeout
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Writing the research output failed
    #[error("Failed to save to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The research topic was empty
    #[error("Research topic must not be empty")]
    EmptyTopic,
}

impl Error {
    pub(crate) fn tool(tool: impl Into<String>, message: impl ToString) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    /// Map a ureq error, keeping timeouts distinct from other failures.
    pub(crate) fn from_http(operation: &str, secs: u64, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => Self::Timeout {
                operation: operation.to_string(),
                secs,
            },
            ureq::Error::StatusCode(code) => Self::tool(operation, format!("HTTP error {}", code)),
            other => Self::tool(operation, format!("Request error: {}", other)),
        }
    }

    /// Whether this error came from an expired timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for research operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_timeout() {
        let err = Error::from_http("Wikipedia", 5, ureq::Error::Timeout(ureq::Timeout::Global));
        assert!(err.is_timeout());
        assert!(matches!(err, Error::Timeout { secs: 5, ref operation } if operation == "Wikipedia"));
        assert_eq!(err.to_string(), "Wikipedia timed out after 5s");
    }

    #[test]
    fn test_from_http_status() {
        let err = Error::from_http("Web Search", 5, ureq::Error::StatusCode(503));
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "Web Search error: HTTP error 503");
    }
}
