//! Socket server for the ALS correction daemon.
//!
//! Startup resolves the sample regions, connects to the compositor and binds
//! the command socket. Each connection is served on its own task; the
//! capture engine sits behind one async mutex so captures never overlap.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use als_core::config::Config;
use als_core::{CaptureEngine, Compositor, RegionTable};
use als_rpc::{CommandCodec, ResponseLayout, socket_path};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, Result};
use crate::handlers::handle_command;
use crate::session::ConnectionId;

/// State shared by all connections.
pub struct DaemonState {
    pub engine: CaptureEngine,
    pub samples_served: u64,
    pub fallbacks_served: u64,
}

impl DaemonState {
    #[must_use]
    pub fn new(engine: CaptureEngine) -> Self {
        Self {
            engine,
            samples_served: 0,
            fallbacks_served: 0,
        }
    }
}

/// How [`run`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// No sample anchor is configured; nothing was started.
    NotConfigured,
    /// The server ran and was shut down.
    Stopped,
}

/// Resolve the socket path from configuration.
#[must_use]
pub fn resolve_socket_path(config: &Config) -> PathBuf {
    config.socket_path.clone().unwrap_or_else(socket_path)
}

/// Start the daemon from `config` and serve until `shutdown` resolves.
///
/// `connect` opens the compositor connection and is only called once the
/// configuration is known to be usable.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the compositor cannot
/// be reached, or the socket cannot be bound.
pub async fn run<F>(
    config: &Config,
    connect: F,
    shutdown: impl Future<Output = ()>,
) -> Result<Startup>
where
    F: FnOnce() -> als_core::Result<Box<dyn Compositor>>,
{
    config.validate()?;

    let Some(anchor) = config.anchor()? else {
        error!("Screenshot grab area is not configured, set grabrect to \"left top\"");
        return Ok(Startup::NotConfigured);
    };

    let regions = RegionTable::new(anchor, config.radius, config.display())?;
    regions.log_regions();

    let compositor = connect()?;
    let engine = CaptureEngine::new(compositor, regions, config.capture_timeout());

    let path = resolve_socket_path(config);
    serve(engine, &path, config.response_layout, shutdown).await?;

    Ok(Startup::Stopped)
}

/// Bind `path` and serve commands until `shutdown` resolves, then remove
/// the socket file.
///
/// # Errors
///
/// Returns an error if another daemon answers on `path` or the socket cannot
/// be bound.
pub async fn serve(
    engine: CaptureEngine,
    path: &Path,
    layout: ResponseLayout,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    cleanup_stale_socket(path).await?;

    let listener = UnixListener::bind(path)?;
    info!("Daemon listening on {:?} ({:?} frames)", path, layout);

    let state = Arc::new(Mutex::new(DaemonState::new(engine)));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested, stopping server");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state, layout).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            },
        }
    }

    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("Failed to remove socket file {:?}: {}", path, e);
    }

    Ok(())
}

async fn cleanup_stale_socket(path: &Path) -> Result<()> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Err(DaemonError::AlreadyRunning(path.to_path_buf()));
        }
        info!("Removing stale socket at {}", path.display());
        std::fs::remove_file(path)?;
    }
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    state: Arc<Mutex<DaemonState>>,
    layout: ResponseLayout,
) -> Result<()> {
    let mut framed = Framed::new(stream, CommandCodec::new(layout));

    let connection = ConnectionId::new();
    debug!("New connection: {}", connection);

    while let Some(result) = framed.next().await {
        let command = match result {
            Ok(command) => command,
            Err(e) => {
                warn!("[{}] Closing connection: {}", connection, e);
                break;
            }
        };

        let reply = handle_command(&connection, &command, &state).await;
        framed.send(reply).await?;
    }

    debug!("Connection closed: {}", connection);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
    }
}
