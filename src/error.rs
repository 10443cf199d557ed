//! Error types for printer-admin
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error variants (Auth, Api, Agent, Wire)
//! - A distinct duplicate-name variant so callers can surface a
//!   user-visible "duplicate" message instead of a generic failure
//! - Context information (status codes, endpoint, printer name)

use thiserror::Error;

/// Result type alias for printer-admin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for printer-admin
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Credential exchange against the identity endpoint failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server answered with a non-success status code
    #[error("API error from {endpoint}: status {status}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// The endpoint that produced the error
        endpoint: String,
        /// Response body, when one was readable
        body: String,
    },

    /// A create collided with an existing record of the same name (HTTP 409)
    #[error("duplicate printer name: {0}")]
    DuplicateName(String),

    /// No record matched the caller's selection
    #[error("printer not found: {0}")]
    NotFound(String),

    /// The caller's selection was ambiguous or incomplete
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Management agent invocation failed (missing binary, bad exit status)
    #[error("agent error: {0}")]
    Agent(String),

    /// Vendor XML could not be parsed or built
    #[error("wire format error: {0}")]
    Wire(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify an API response status for a create call.
    ///
    /// 409 is the server's duplicate-name conflict and gets its own variant so
    /// the consumer can show a "duplicate" message rather than a generic failure.
    pub(crate) fn from_create_status(
        status: u16,
        endpoint: &str,
        body: String,
        name: &str,
    ) -> Self {
        if status == 409 {
            Error::DuplicateName(name.to_string())
        } else {
            Error::Api {
                status,
                endpoint: endpoint.to_string(),
                body,
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_conflict_maps_to_duplicate_name() {
        let err = Error::from_create_status(
            409,
            "/JSSResource/printers/id/0",
            String::new(),
            "Lab Printer",
        );
        assert!(matches!(err, Error::DuplicateName(name) if name == "Lab Printer"));
    }

    #[test]
    fn other_create_failures_keep_status_context() {
        let err = Error::from_create_status(
            500,
            "/JSSResource/printers/id/0",
            "boom".to_string(),
            "Lab Printer",
        );
        match err {
            Error::Api {
                status,
                endpoint,
                body,
            } => {
                assert_eq!(status, 500);
                assert_eq!(endpoint, "/JSSResource/printers/id/0");
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn error_display_is_human_readable() {
        let err = Error::Auth("bad credentials".to_string());
        assert_eq!(err.to_string(), "authentication failed: bad credentials");

        let err = Error::Config {
            message: "base_url must be absolute".to_string(),
            key: Some("base_url".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "configuration error: base_url must be absolute"
        );
    }
}
