//! Secret stores
//!
//! Plaintext only ever lives inside [`SecretValue`], which has no
//! `Serialize` impl and redacts itself in `Debug` and `Display`.

use crate::error::InjectionError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::process::Command;
use tracing::debug;

/// Prefix for `op://Vault/Item/Field` references
const OP_PREFIX: &str = "op://";

/// Prefix of environment variables read by [`EnvSecretStore`]
pub const ENV_SECRET_PREFIX: &str = "STACKFLEET_SECRET_";

/// Secret plaintext
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(plaintext.into())
    }

    /// Borrow the plaintext. Only the provider boundary should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([redacted])")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// External secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by id. `source` is the store-specific lookup key
    /// (the secret resource's `source` input, or the id itself).
    async fn get(&self, id: &str, source: &str) -> Result<Option<SecretValue>, InjectionError>;
}

/// Reads `STACKFLEET_SECRET_<ID>` environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    /// Variable name for a secret id: upper-cased, non-alphanumerics as `_`
    pub fn variable_name(id: &str) -> String {
        let suffix: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", ENV_SECRET_PREFIX, suffix)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, id: &str, _source: &str) -> Result<Option<SecretValue>, InjectionError> {
        let name = Self::variable_name(id);
        debug!(secret = %id, variable = %name, "Reading secret from environment");
        Ok(std::env::var(&name).ok().map(SecretValue::new))
    }
}

/// Resolves `op://` sources through the 1Password CLI
#[derive(Debug, Clone, Default)]
pub struct OnePasswordStore {
    account: Option<String>,
}

impl OnePasswordStore {
    pub fn new() -> Self {
        Self {
            account: std::env::var("OP_ACCOUNT").ok(),
        }
    }

    pub fn is_op_reference(source: &str) -> bool {
        source.starts_with(OP_PREFIX)
    }
}

#[async_trait]
impl SecretStore for OnePasswordStore {
    async fn get(&self, id: &str, source: &str) -> Result<Option<SecretValue>, InjectionError> {
        if !Self::is_op_reference(source) {
            debug!(secret = %id, "Secret source is not a 1Password reference");
            return Ok(None);
        }

        debug!(secret = %id, reference = %source, "Resolving 1Password reference");
        let mut cmd = Command::new("op");
        cmd.arg("read").arg(source);
        if let Some(account) = &self.account {
            cmd.arg("--account").arg(account);
        }

        let output = cmd.output().await.map_err(|e| InjectionError::Store {
            secret: id.to_string(),
            message: format!("failed to run 1Password CLI: {}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                return Ok(None);
            }
            let hint = if stderr.contains("not signed in") || stderr.contains("session expired") {
                "\nhint: run `op signin` or set OP_SERVICE_ACCOUNT_TOKEN"
            } else if stderr.contains("multiple accounts") {
                "\nhint: set OP_ACCOUNT to pick an account"
            } else {
                ""
            };
            return Err(InjectionError::Store {
                secret: id.to_string(),
                message: format!("{}{}", stderr.trim(), hint),
            });
        }

        let secret = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(secret = %id, "Resolved 1Password reference");
        Ok(Some(SecretValue::new(secret)))
    }
}

/// In-memory store keyed by secret id
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    values: HashMap<String, SecretValue>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, plaintext: impl Into<String>) -> Self {
        self.insert(id, plaintext);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, plaintext: impl Into<String>) {
        self.values.insert(id.into(), SecretValue::new(plaintext));
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, id: &str, _source: &str) -> Result<Option<SecretValue>, InjectionError> {
        Ok(self.values.get(id).cloned())
    }
}
