//! Runtime settings
//!
//! Read from `settings.yaml` in the project's `.stackfleet/` directory, or
//! from the global config directory, then overridden by `STACKFLEET_*`
//! environment variables.
//!
//! ```yaml
//! max_parallel_stacks: 4
//! provider_rate_limit: 8
//! resource_timeout_secs: 1800
//! secret_backend: onepassword
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const SETTINGS_FILE: &str = "settings.yaml";

/// Where secret plaintext is fetched from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// `STACKFLEET_SECRET_<ID>` environment variables
    #[default]
    Env,
    /// 1Password CLI (`op read`)
    #[serde(alias = "1password", alias = "op")]
    OnePassword,
}

impl FromStr for SecretBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "onepassword" | "1password" | "op" => Ok(Self::OnePassword),
            other => Err(ConfigError::InvalidSetting {
                key: "secret_backend".to_string(),
                message: format!("unknown backend '{}' (expected env or onepassword)", other),
            }),
        }
    }
}

impl fmt::Display for SecretBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretBackend::Env => write!(f, "env"),
            SecretBackend::OnePassword => write!(f, "onepassword"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_parallel_stacks: usize,
    pub provider_rate_limit: usize,
    /// Default per-resource timeout; none waits indefinitely
    pub resource_timeout_secs: Option<u64>,
    pub secret_backend: SecretBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parallel_stacks: 4,
            provider_rate_limit: 8,
            resource_timeout_secs: None,
            secret_backend: SecretBackend::Env,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // an empty file is a valid, all-default document
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings for a project: project file, else global file, else
    /// defaults; environment overrides applied last
    pub fn load(project_root: Option<&Path>) -> Result<Self> {
        let mut settings = match settings_path(project_root) {
            Some(path) => {
                debug!(path = %path.display(), "Loading settings");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_var("STACKFLEET_MAX_PARALLEL_STACKS") {
            self.max_parallel_stacks = parse_number("STACKFLEET_MAX_PARALLEL_STACKS", &value)?;
        }
        if let Some(value) = env_var("STACKFLEET_PROVIDER_RATE_LIMIT") {
            self.provider_rate_limit = parse_number("STACKFLEET_PROVIDER_RATE_LIMIT", &value)?;
        }
        if let Some(value) = env_var("STACKFLEET_RESOURCE_TIMEOUT_SECS") {
            self.resource_timeout_secs =
                Some(parse_number("STACKFLEET_RESOURCE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = env_var("STACKFLEET_SECRET_BACKEND") {
            self.secret_backend = value.parse()?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.max_parallel_stacks == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "max_parallel_stacks".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.provider_rate_limit == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "provider_rate_limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn settings_path(project_root: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = project_root {
        let path = root.join(".stackfleet").join(SETTINGS_FILE);
        if path.exists() {
            return Some(path);
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join(crate::APP_DIR).join(SETTINGS_FILE))
        .filter(|path| path.exists())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidSetting {
            key: key.to_string(),
            message: e.to_string(),
        })
}
