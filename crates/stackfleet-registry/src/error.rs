//! Registry and placement errors

use stackfleet_core::ResourceKind;

/// Node registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("invalid node definition: {0}")]
    InvalidConfig(String),

    #[error("node '{0}' is registered more than once")]
    DuplicateNode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Placement failures. All are fatal for the owning stack.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacementError {
    #[error("no eligible node for '{service}' (constraints: {constraints})")]
    NoEligibleNode { service: String, constraints: String },

    #[error("'{service}' wants {desired} instance(s) but only {eligible} eligible node(s) exist")]
    InsufficientCapacity {
        service: String,
        desired: u32,
        eligible: usize,
    },

    #[error("'{service}' desired count {desired} is outside autoscaling bounds [{min}, {max}]")]
    ScalingOutOfBounds {
        service: String,
        desired: u32,
        min: u32,
        max: u32,
    },

    #[error("'{service}' is a {kind} resource and cannot be placed")]
    NotAWorkload { service: String, kind: ResourceKind },

    #[error("'{service}' failed its health check after {attempts} attempt(s) (rolled back: {rolled_back})")]
    Unhealthy {
        service: String,
        attempts: u32,
        rolled_back: bool,
    },

    #[error("'{service}' failed its health check and rollback failed: {message}")]
    RollbackFailed { service: String, message: String },

    #[error("failed to list nodes: {0}")]
    Registry(String),
}
