use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "stack file not found. Looked in:\n\
        - current directory: stackfleet.local.kdl, stackfleet.kdl, stackfleet.yaml, stackfleet.yml, stackfleet.json\n\
        - ./.stackfleet/ directory\n\
        - ~/.config/stackfleet/stackfleet.kdl\n\
        or set STACKFLEET_CONFIG_PATH to point at a file directly"
    )]
    StackFileNotFound,

    #[error("invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("settings parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
