use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuSyncError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{tool} exited with status {status}: {message}")]
    Tool {
        tool: String,
        status: i32,
        message: String,
    },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T, E = MuSyncError> = std::result::Result<T, E>;
