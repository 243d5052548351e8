//! Error types for the drain engine

use thiserror::Error;

/// Drain result type
pub type Result<T> = std::result::Result<T, DrainError>;

/// Errors that can occur while draining a host
#[derive(Error, Debug)]
pub enum DrainError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials or profile could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hypervisor name not present in the host inventory
    #[error("Hypervisor {0} not found")]
    HostNotFound(String),

    /// Both an include and an exclude domain were given
    #[error("--domain ({include}) and --exceptdomain ({exclude}) are mutually exclusive")]
    ConflictingDomainFilter {
        /// Include-only domain
        include: String,
        /// Excluded domain
        exclude: String,
    },

    /// The orchestration API answered with an error payload
    #[error("API error from {command} ({code}): {text}")]
    Api {
        /// API command that failed
        command: String,
        /// Platform error code
        code: u16,
        /// Platform error text
        text: String,
    },

    /// Response did not have the expected shape
    #[error("Malformed response from {command}: {reason}")]
    MalformedResponse {
        /// API command that was called
        command: String,
        /// What was wrong with it
        reason: String,
    },
}

impl DrainError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a host-not-found error
    pub fn host_not_found(name: impl Into<String>) -> Self {
        Self::HostNotFound(name.into())
    }

    /// Create an API error
    pub fn api(command: impl Into<String>, code: u16, text: impl Into<String>) -> Self {
        Self::Api {
            command: command.into(),
            code,
            text: text.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a run before any workload is touched
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::HostNotFound(_) | Self::ConflictingDomainFilter { .. }
        )
    }
}
