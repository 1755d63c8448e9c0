// SPDX-License-Identifier: MIT

//! Typed error handling for trellis-rs
//!
//! `TrellisError` is what crosses public API boundaries. The sub-enums keep
//! the three failure families apart: graph contract violations (fail fast),
//! model adapter failures (retried, then reported), and tool failures (always
//! converted into an error result the model can see).

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for trellis-rs
#[derive(Debug, Error)]
pub enum TrellisError {
    /// Graph construction or execution contract violations
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Model adapter failures that could not be recovered
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration errors (invalid values, unreadable files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph construction and execution errors
///
/// Everything here is a programming or configuration defect, never a
/// condition a node is expected to recover from.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// The graph has no entry node
    #[error("graph '{0}' has no entry node")]
    MissingEntry(String),

    /// An edge, entry or finalizer references a node that was never added
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A node was given more than one outgoing edge definition
    #[error("node '{0}' has more than one outgoing edge definition")]
    DuplicateOutgoing(String),

    /// A closed route label has no destination in the edge's mapping
    #[error("conditional edge from '{node}' has no destination for label '{label}'")]
    IncompleteRouteMap { node: String, label: String },

    /// A routing function produced a label absent from its mapping
    #[error("routing function of '{node}' returned unknown label '{label}'")]
    UnknownRouteLabel { node: String, label: String },

    /// The designated finalizer has outgoing edges
    #[error("finalizer '{0}' must be a terminal node")]
    FinalizerNotTerminal(String),

    /// The run was cancelled between hops
    #[error("run cancelled after {hops} hops")]
    Cancelled { hops: usize },
}

/// Model adapter errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Model provider not supported
    #[error("Model provider not supported: {0}")]
    UnsupportedProvider(String),

    /// Transport or API-level failure
    #[error("Model request failed: {0}")]
    Request(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The call did not finish within its timeout
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid or unparseable response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Every retry attempt failed
    #[error("Model call failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Tool execution errors
///
/// Only ever seen inside the invoker, which turns each of these into an
/// error-flagged `ToolResult`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    /// Arguments failed schema validation
    #[error("invalid arguments for '{tool}': {message}")]
    Validation { tool: String, message: String },

    /// The tool body failed
    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    /// The tool did not finish within its timeout
    #[error("tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// No tool registered under this name
    #[error("unknown tool '{0}'")]
    NotFound(String),
}

impl TrellisError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl ModelError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Request(_) | ModelError::RateLimited { .. } | ModelError::Timeout(_) => {
                true
            }
            ModelError::InvalidResponse(_) => true,
            ModelError::ApiKeyMissing(_)
            | ModelError::UnsupportedProvider(_)
            | ModelError::Exhausted { .. } => false,
        }
    }
}

impl ToolError {
    /// Create an execution error for a tool
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a validation error for a tool
    pub fn validation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<&str> for TrellisError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for TrellisError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Request(format!("timeout: {}", err))
        } else {
            ModelError::Request(err.to_string())
        }
    }
}
