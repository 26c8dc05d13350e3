pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{SecretBackend, Settings};

use std::path::PathBuf;

pub(crate) const APP_DIR: &str = "stackfleet";

/// Stack file names, highest priority first
const CANDIDATES: [&str; 5] = [
    "stackfleet.local.kdl",
    "stackfleet.kdl",
    "stackfleet.yaml",
    "stackfleet.yml",
    "stackfleet.json",
];

/// `~/.config/stackfleet`, created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the stack file to operate on.
///
/// Search order:
/// 1. `STACKFLEET_CONFIG_PATH`
/// 2. current directory, by [`CANDIDATES`] priority
/// 3. `./.stackfleet/`, same order
/// 4. `~/.config/stackfleet/stackfleet.kdl`
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACKFLEET_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".stackfleet");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join(APP_DIR).join("stackfleet.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}
