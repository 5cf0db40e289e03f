//! ALS correction daemon library providing the socket server.
//!
//! The daemon answers `take_screenshot` commands with the average color of
//! a small screen region next to the ambient light sensor.

pub mod error;
pub(crate) mod handlers;
pub mod server;
pub(crate) mod session;

pub use error::{DaemonError, Result};
pub use server::{DaemonState, Startup, resolve_socket_path, run, serve, shutdown_signal};
