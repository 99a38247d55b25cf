//! Error types for the DNS sidecar
//!
//! Every error in this module is fatal to the lifecycle except
//! [`Error::ProviderPoll`], which the
//! [`PropagationWaiter`](crate::PropagationWaiter) tolerates up to its
//! failure budget.

use crate::lifecycle::LifecycleState;
use thiserror::Error;

/// Result type alias for sidecar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS sidecar
#[derive(Error, Debug)]
pub enum Error {
    /// The address to publish could not be determined
    #[error("Address resolution failed: {0}")]
    Resolution(String),

    /// The provider rejected a change submission
    #[error("Change submission rejected by {provider}: {message}")]
    ProviderSubmission {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A single change-status query failed
    #[error("Change status query to {provider} failed: {message}")]
    ProviderPoll {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Too many change-status queries failed during one propagation wait
    #[error("Gave up waiting for propagation after {failures} failed status queries (last: {last_error})")]
    PropagationExhausted {
        /// Number of failed status queries recorded
        failures: usize,
        /// The last query error
        last_error: String,
    },

    /// A termination signal arrived before any record was created
    #[error("Termination signal {0} received before the record was created")]
    SignalDuringSetup(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors (metadata services)
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A fatal error tagged with the lifecycle stage it happened in
    #[error("{stage}: {source}")]
    Stage {
        /// State the controller was in when the error occurred
        stage: LifecycleState,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an address resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a change submission error
    pub fn submission(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderSubmission {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a change-status query error
    pub fn poll(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderPoll {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Tag an error with the lifecycle stage it occurred in
    pub fn at_stage(self, stage: LifecycleState) -> Self {
        match self {
            // Keep the innermost stage
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was tagged with, if any
    pub fn stage(&self) -> Option<LifecycleState> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error without its stage tag
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}
