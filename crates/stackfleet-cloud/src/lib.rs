//! stackfleet provisioning runtime
//!
//! Executes a [`ProvisioningGraph`](stackfleet_core::ProvisioningGraph)
//! against registered materializers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackfleet CLI                   │
//! │                 (stackfleet apply)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackfleet-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Executor (bounded stack workers)         │   │
//! │  │  placement -> injection -> ensure -> gate │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ SecretStore  │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼─────────────────────────┐
//! │ trait Materializer { ensure }   │
//! │ LocalProvider, cloud providers  │
//! └─────────────────────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod executor;
pub mod inject;
pub mod local;
pub mod provider;
pub mod report;
pub mod secrets;
pub mod state;

// Re-exports
pub use action::ActionType;
pub use error::{CloudError, InjectionError, MaterializeError, ProviderError, Result};
pub use executor::{Executor, ExecutorConfig};
pub use inject::{RuntimeEnvironment, SecretInjector};
pub use local::LocalProvider;
pub use provider::{MaterializeOutcome, MaterializeRequest, Materializer, ProviderRegistry};
pub use report::{ExecutionReport, ResourceReport, StackError, StackReport, StackState};
pub use secrets::{EnvSecretStore, MemorySecretStore, OnePasswordStore, SecretStore, SecretValue};
pub use state::{GlobalState, ResourceState, StateLock, StateManager};
