//! Persisted provisioning state
//!
//! Manages `.stackfleet/state.json`, which records every resource the local
//! provider has ensured and the last stable placement of each workload.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackfleet_core::{Literal, ResourceKind};
use stackfleet_registry::Placement;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackfleet";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Whole-project state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    /// Resources keyed by `<stack>/<resource>`
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
    /// Last stable placement per workload, keyed by `<stack>/<resource>`
    #[serde(default)]
    pub placements: BTreeMap<String, Placement>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            placements: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.updated_at = Utc::now();
    }

    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    pub fn set_placements(&mut self, placements: impl IntoIterator<Item = Placement>) {
        for placement in placements {
            self.placements.insert(placement.service.clone(), placement);
        }
        self.updated_at = Utc::now();
    }

    /// Resources belonging to one stack
    pub fn stack_resources(&self, stack: &str) -> Vec<(&String, &ResourceState)> {
        let prefix = format!("{}/", stack);
        self.resources
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .collect()
    }
}

/// State of a single ensured resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-assigned id
    pub id: String,
    pub kind: ResourceKind,
    /// Digest of the inputs the resource was last ensured with
    pub fingerprint: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, Literal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, kind: ResourceKind, fingerprint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            fingerprint: fingerprint.into(),
            outputs: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: Literal) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }
}

/// Reads and writes the state file
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state atomically: the new content goes to a temp file that
    /// replaces `state.json` by rename, after the old file is copied to the
    /// backup. A crash mid-save leaves either the old or the new state.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let tmp = self.state_dir().join(STATE_TMP);

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&tmp, &path).await?;

        tracing::debug!(
            resources = state.resources.len(),
            placements = state.placements.len(),
            "Saved state"
        );
        Ok(())
    }

    /// Acquire the state lock. The lock file is created exclusively, so two
    /// concurrent runs cannot both hold it; locks older than an hour are stale.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let info = LockInfo::current();
        let content = serde_json::to_string_pretty(&info)?;

        // second pass only after removing a stale lock
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).await?;
                    file.flush().await?;
                    tracing::debug!(holder = %info.holder, "Acquired state lock");
                    return Ok(StateLock {
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let held = fs::read_to_string(&lock_path)
                        .await
                        .ok()
                        .and_then(|c| serde_json::from_str::<LockInfo>(&c).ok());
                    match held {
                        Some(held) if held.is_stale() => {
                            tracing::warn!(holder = %held.holder, "Removing stale state lock");
                            fs::remove_file(&lock_path).await?;
                        }
                        Some(held) => {
                            return Err(CloudError::LockError(format!(
                                "State is locked by {} since {}",
                                held.holder, held.acquired_at
                            )));
                        }
                        // being written by another run
                        None => {
                            return Err(CloudError::LockError(format!(
                                "State is locked ({})",
                                lock_path.display()
                            )));
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(
            "State lock was taken by another run".to_string(),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.acquired_at) >= chrono::Duration::hours(1)
    }
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfleet_registry::PlacementRegime;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_resource(
            "net-base/vpc".to_string(),
            ResourceState::new("local-network-1", ResourceKind::Network, "abc")
                .with_output("vpcId", Literal::from("vpc-1")),
        );
        state.set_placements(vec![Placement {
            service: "lb/traefik".to_string(),
            regime: PlacementRegime::Constrained,
            desired_count: 1,
            nodes: vec!["n1".to_string()],
            scaling: None,
        }]);

        manager.save(&state).await.unwrap();
        manager.save(&state).await.unwrap();
        assert!(manager.backup_path().exists());

        let loaded = manager.load().await.unwrap();
        assert_eq!(
            loaded.get_resource("net-base/vpc").unwrap().outputs["vpcId"],
            Literal::from("vpc-1")
        );
        assert_eq!(loaded.placements["lb/traefik"].nodes, vec!["n1".to_string()]);
        assert_eq!(loaded.stack_resources("net-base").len(), 1);
        assert!(loaded.stack_resources("net").is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_atomically_and_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut first = GlobalState::new();
        first.set_resource(
            "net-base/vpc".to_string(),
            ResourceState::new("local-network-1", ResourceKind::Network, "first"),
        );
        manager.save(&first).await.unwrap();

        let mut second = first.clone();
        second.set_resource(
            "net-base/vpc".to_string(),
            ResourceState::new("local-network-1", ResourceKind::Network, "second"),
        );
        manager.save(&second).await.unwrap();

        assert!(!manager.state_dir().join(STATE_TMP).exists());
        let current = manager.load().await.unwrap();
        assert_eq!(current.resources["net-base/vpc"].fingerprint, "second");

        let backup: GlobalState =
            serde_json::from_str(&std::fs::read_to_string(manager.backup_path()).unwrap())
                .unwrap();
        assert_eq!(backup.resources["net-base/vpc"].fingerprint, "first");
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();

        let stale = LockInfo {
            holder: "ci-runner".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(manager.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = manager.acquire_lock().await.unwrap();
        let held: LockInfo =
            serde_json::from_str(&std::fs::read_to_string(manager.lock_path()).unwrap()).unwrap();
        assert!(!held.is_stale());
        lock.release().await.unwrap();
        assert!(!manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));
        lock.release().await.unwrap();
        manager.acquire_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(
            manager.load().await,
            Err(CloudError::StateError(_))
        ));
    }
}
