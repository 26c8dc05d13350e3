//! Secret/config injection
//!
//! Assembles a workload's runtime environment from resolved environment
//! values and secret bindings. Secret plaintext is fetched here and
//! nowhere else.

use crate::error::InjectionError;
use crate::secrets::{SecretStore, SecretValue};
use stackfleet_core::{ResolvedValue, SecretDeclaration, SecretRef};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Environment handed to the provider for one workload.
///
/// Not serializable; `Debug` redacts secret values.
#[derive(Debug, Clone, Default)]
pub struct RuntimeEnvironment {
    variables: BTreeMap<String, String>,
    secrets: BTreeMap<String, SecretValue>,
}

impl RuntimeEnvironment {
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn secret(&self, key: &str) -> Option<&SecretValue> {
        self.secrets.get(key)
    }

    /// Names of secret-bound variables (never their values)
    pub fn secret_keys(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binds secret references into runtime environments
pub struct SecretInjector {
    store: Arc<dyn SecretStore>,
    catalog: BTreeMap<String, SecretDeclaration>,
}

impl SecretInjector {
    /// `catalog` maps secret ids to their declarations (see
    /// [`ProvisioningGraph::secrets`](stackfleet_core::ProvisioningGraph::secrets))
    pub fn new(store: Arc<dyn SecretStore>, catalog: BTreeMap<String, SecretDeclaration>) -> Self {
        Self { store, catalog }
    }

    /// Build the runtime environment for `service`.
    ///
    /// A missing secret fails the whole injection.
    pub async fn inject(
        &self,
        service: &str,
        environment: &BTreeMap<String, ResolvedValue>,
        secrets: &BTreeMap<String, SecretRef>,
    ) -> Result<RuntimeEnvironment, InjectionError> {
        let mut runtime = RuntimeEnvironment::default();

        for (key, value) in environment {
            match value {
                ResolvedValue::Secret(handle) => {
                    let secret = self.fetch(key, handle.secret_id()).await?;
                    runtime.secrets.insert(key.clone(), secret);
                }
                other => {
                    runtime.variables.insert(key.clone(), other.to_string());
                }
            }
        }

        for (key, reference) in secrets {
            let secret = self.fetch(key, &reference.secret).await?;
            runtime.secrets.insert(key.clone(), secret);
        }

        debug!(
            service,
            variables = runtime.variables.len(),
            secrets = runtime.secrets.len(),
            "Runtime environment assembled"
        );
        Ok(runtime)
    }

    async fn fetch(&self, env_key: &str, secret_id: &str) -> Result<SecretValue, InjectionError> {
        let source = self
            .catalog
            .get(secret_id)
            .map(|d| d.source.as_str())
            .unwrap_or(secret_id);

        match self.store.get(secret_id, source).await? {
            Some(value) => {
                debug!(env_key, secret = %secret_id, "Bound secret");
                Ok(value)
            }
            None => Err(InjectionError::SecretNotFound {
                env_key: env_key.to_string(),
                secret: secret_id.to_string(),
            }),
        }
    }
}
