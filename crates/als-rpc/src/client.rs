//! Socket client for the ALS correction daemon.
//!
//! One connection can carry any number of commands; each command gets
//! exactly one reply.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use als_types::{AverageResult, ResponseLayout};

use crate::error::{ClientError, Result};
use crate::protocol::{Command, Reply};
use crate::transport::SampleCodec;

/// Socket file name inside the runtime directory.
pub const SOCKET_NAME: &str = "als_correction.sock";

/// Default bound on a single request, slightly above the daemon's default
/// capture timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR").map_or_else(|_| std::env::temp_dir(), PathBuf::from)
}

/// Get the default socket path for the daemon.
///
/// Prefers `$XDG_RUNTIME_DIR` and falls back to the system temp directory.
#[must_use]
pub fn socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_NAME)
}

/// Connection to a running daemon.
pub struct AlsClient {
    framed: Framed<UnixStream, SampleCodec>,
    timeout: Duration,
}

impl AlsClient {
    /// Connect at the default socket path expecting packed frames.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the socket connection fails.
    pub async fn connect() -> Result<Self> {
        Self::connect_to(socket_path(), ResponseLayout::Packed).await
    }

    /// Connect at a custom socket path with the daemon's frame layout.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the socket connection fails.
    pub async fn connect_to(path: impl AsRef<Path>, layout: ResponseLayout) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        Ok(Self {
            framed: Framed::new(stream, SampleCodec::new(layout)),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request the current screen color sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, the connection
    /// closes, or the daemon answers with a status line instead of a frame.
    pub async fn take_screenshot(&mut self) -> Result<AverageResult> {
        match self.send(Command::take_screenshot()).await? {
            Reply::Sample(result) => Ok(result),
            Reply::Status { code, message } => Err(ClientError::Rejected { code, message }),
        }
    }

    /// Send any command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails, the connection closes, or no reply
    /// arrives within the request timeout.
    pub async fn send(&mut self, command: Command) -> Result<Reply> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.exchange(command))
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
    }

    async fn exchange(&mut self, command: Command) -> Result<Reply> {
        self.framed.send(command).await?;
        match self.framed.next().await {
            Some(reply) => Ok(reply?),
            None => Err(ClientError::ConnectionClosed),
        }
    }
}
