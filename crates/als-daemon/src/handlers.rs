//! Command handlers for the daemon.

use als_core::SampleSource;
use als_rpc::{CMD_TAKE_SCREENSHOT, Command, Reply};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::server::DaemonState;
use crate::session::ConnectionId;

/// Produce the reply for one command.
pub async fn handle_command(
    connection: &ConnectionId,
    command: &Command,
    state: &Mutex<DaemonState>,
) -> Reply {
    trace!("[{}] command: {}", connection, command);

    match command.name.as_str() {
        CMD_TAKE_SCREENSHOT => handle_take_screenshot(connection, state).await,
        other => {
            debug!("[{}] Unknown command: {}", connection, other);
            Reply::not_recognized()
        }
    }
}

async fn handle_take_screenshot(connection: &ConnectionId, state: &Mutex<DaemonState>) -> Reply {
    let mut state = state.lock().await;
    let sample = state.engine.sample_detailed().await;

    state.samples_served += 1;
    if sample.source != SampleSource::Fresh {
        state.fallbacks_served += 1;
    }

    debug!(
        "[{}] take_screenshot -> r={} g={} b={} ({:?}, {} served, {} fallbacks)",
        connection,
        sample.result.red,
        sample.result.green,
        sample.result.blue,
        sample.source,
        state.samples_served,
        state.fallbacks_served
    );

    Reply::Sample(sample.result)
}
