//! Error types for costlens.
//!
//! Each layer owns an error enum: [`AgentError`] for LLM calls and
//! configuration, [`PricingError`] for the pricing-resolution core, and
//! [`CommandError`] for the CLI. [`Error`] wraps them all at the crate edge.

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// LLM or configuration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Pricing-resolution failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the LLM agent layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error(
        "API key missing: set COSTLENS_API_KEY, AZURE_INFERENCE_API_KEY or OPENAI_API_KEY"
    )]
    ApiKeyMissing,

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// The configured provider name is unknown.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The provider API call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error detail from the transport or provider.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The model response could not be parsed.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// Parse diagnostic.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The call exceeded its deadline.
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Deadline in seconds.
        seconds: u64,
    },
}

/// Errors raised while resolving prices against the remote pricing tool.
///
/// None of these is fatal to a batch: the orchestrator converts each into
/// sentinel pricing for the affected scope.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Session (connection or schema discovery) could not be established.
    #[error("pricing session failed: {message}")]
    Session {
        /// Failure detail.
        message: String,
    },

    /// The filter synthesizer failed or produced an unusable filter.
    #[error("filter synthesis failed: {message}")]
    Synthesis {
        /// Failure detail.
        message: String,
    },

    /// The pricing tool call failed.
    #[error("pricing tool invocation failed: {message}")]
    Invocation {
        /// Failure detail.
        message: String,
    },

    /// Releasing the session failed.
    #[error("pricing session cleanup failed: {message}")]
    Cleanup {
        /// Failure detail.
        message: String,
    },
}

impl PricingError {
    /// Shorthand for [`PricingError::Session`].
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Shorthand for [`PricingError::Synthesis`].
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
        }
    }

    /// Shorthand for [`PricingError::Invocation`].
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }

    /// Shorthand for [`PricingError::Cleanup`].
    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::Cleanup {
            message: message.into(),
        }
    }

    /// Short kind label used in logs and batch diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Synthesis { .. } => "synthesis",
            Self::Invocation { .. } => "invocation",
            Self::Cleanup { .. } => "cleanup",
        }
    }
}

impl From<AgentError> for PricingError {
    fn from(err: AgentError) -> Self {
        Self::synthesis(err.to_string())
    }
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not run.
    #[error("{0}")]
    ExecutionFailed(String),

    /// User input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
