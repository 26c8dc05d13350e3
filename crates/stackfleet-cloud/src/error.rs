//! Provider, injection and materialization errors

use stackfleet_core::{PropagationError, ResourceKind};
use stackfleet_registry::PlacementError;
use std::time::Duration;
use thiserror::Error;

/// Failures at the provider boundary, surfaced verbatim
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("no materializer registered for kind {0}")]
    Unsupported(ResourceKind),

    #[error("provider did not return declared output '{output}'")]
    MissingOutput { output: String },

    #[error("invalid input '{key}': {message}")]
    InvalidInput { key: String, message: String },

    #[error("provider error: {0}")]
    Failed(String),
}

/// Secret binding failures. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InjectionError {
    #[error("secret '{secret}' not found (bound to {env_key})")]
    SecretNotFound { env_key: String, secret: String },

    #[error("secret store error for '{secret}': {message}")]
    Store { secret: String, message: String },
}

/// Why a single resource failed to materialize
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterializeError {
    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Injection(#[from] InjectionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// State and provider plumbing errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
