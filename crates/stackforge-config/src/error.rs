use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Stack file not found. Looked in:\n\
        - current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl\n\
        - ./.stackforge/ directory\n\
        - ~/.config/stackforge/stack.kdl\n\
        Set STACKFORGE_CONFIG_PATH to point at a file directly"
    )]
    StackFileNotFound,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("KDL parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
