//! Error types for the streaming bridge.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request to the LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider answered with a non-success status.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// A data-stream frame could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Tool callbacks nested deeper than allowed.
    #[error("maximum recursion depth exceeded ({max})")]
    RecursionLimit {
        /// Configured maximum depth.
        max: usize,
    },

    /// A tool call delta was missing the fields needed at this point.
    #[error("malformed tool call: {0}")]
    MalformedToolCall(&'static str),

    /// The model asked for tools but nobody can execute them.
    #[error("tool calls were received but no executor was set")]
    MissingToolExecutor,

    /// The model asked for a tool that does not exist.
    #[error("unexpected tool call: {0}")]
    UnknownTool(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
