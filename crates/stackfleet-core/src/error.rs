use crate::model::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a [`ProvisioningGraph`](crate::ProvisioningGraph).
///
/// All of them are fatal: nothing is provisioned from a graph that failed to build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("stack '{consumer}' references unknown output '{stack}.{output}'")]
    UnknownOutput {
        consumer: String,
        stack: String,
        output: String,
    },

    #[error("stack '{consumer}' references secret '{secret}' which no stack declares")]
    DanglingSecret { consumer: String, secret: String },

    #[error("stack id '{0}' must not contain '.'")]
    InvalidStackId(String),

    #[error("stack '{0}' is declared more than once")]
    DuplicateStack(String),

    #[error("resource '{resource}' is declared more than once in stack '{stack}'")]
    DuplicateResource { stack: String, resource: String },

    #[error("secret '{secret}' is declared by both '{first}' and '{second}'")]
    DuplicateSecret {
        secret: String,
        first: String,
        second: String,
    },

    #[error("stack '{consumer}' references unknown stack '{stack}'")]
    UnknownStack { consumer: String, stack: String },

    #[error("output '{output}' of stack '{stack}' points at unknown resource '{resource}'")]
    UnknownResource {
        stack: String,
        output: String,
        resource: String,
    },

    #[error("resource '{stack}/{resource}' ({kind}) is missing required input '{key}'")]
    MissingInput {
        stack: String,
        resource: String,
        kind: ResourceKind,
        key: String,
    },

    #[error("resource '{stack}/{resource}' has a malformed placement constraint '{expression}'")]
    InvalidPlacement {
        stack: String,
        resource: String,
        expression: String,
    },

    #[error(
        "resource '{stack}/{resource}' uses '{stack}.{output}' before the resource producing it is declared"
    )]
    ForwardReference {
        stack: String,
        resource: String,
        output: String,
    },
}

/// Handle resolution failures.
///
/// The scheduler only starts a stack after all of its producers are
/// materialized, so hitting this means the scheduler is broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropagationError {
    #[error("handle '{stack}.{output}' has not been materialized yet")]
    NotYetMaterialized { stack: String, output: String },
}

/// Errors raised while reading declarative stack definitions.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported stack file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error(
        "project root not found\nsearched from: {0}\nhint: run inside a directory containing stackfleet.kdl"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("discovery error: {path}\nreason: {message}")]
    DiscoveryError { path: PathBuf, message: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, LoadError>;
