//! Socket command protocol for the ALS correction daemon.
//!
//! This crate provides the command and reply types, the transport codecs,
//! and a client helper for talking to the daemon over its Unix socket.
//!
//! # Architecture
//!
//! - [`protocol`]: commands, replies and the binary sample frame
//! - [`transport`]: NUL-terminated command codec (daemon side) and reply
//!   codec (client side)
//! - [`client`]: client helper for connecting to the daemon
//! - [`error`]: codec and client error types
//!
//! # Example
//!
//! ```no_run
//! use als_rpc::AlsClient;
//!
//! # async fn example() -> Result<(), als_rpc::ClientError> {
//! let mut client = AlsClient::connect().await?;
//! let sample = client.take_screenshot().await?;
//!
//! println!("r={} g={} b={}", sample.red, sample.green, sample.blue);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{AlsClient, DEFAULT_REQUEST_TIMEOUT, SOCKET_NAME, socket_path};

pub use error::{ClientError, CodecError, Result};

pub use protocol::{
    CMD_NOT_RECOGNIZED, CMD_TAKE_SCREENSHOT, Command, MAX_COMMAND_LEN, Reply, decode_sample,
    encode_sample,
};

pub use transport::{CommandCodec, SampleCodec};

pub use als_types::{AverageResult, ResponseLayout};
