//! Error types for the als-rpc crate.

use std::io;
use std::time::Duration;

use crate::protocol::MAX_COMMAND_LEN;

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Command too long: {0} bytes without terminator (max: {MAX_COMMAND_LEN})")]
    CommandTooLong(usize),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed status reply: {0}")]
    MalformedStatus(String),
}

/// Errors that can occur with the socket client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command rejected: {code} {message}")]
    Rejected { code: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
