//! Error types for the ALS correction daemon.

use std::path::PathBuf;

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] als_core::Error),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] als_rpc::CodecError),

    /// Another daemon answers on the socket path
    #[error("Another daemon is already running on {}", .0.display())]
    AlreadyRunning(PathBuf),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
