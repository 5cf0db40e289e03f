//! ALS correction daemon entry point.
//!
//! Loads the configuration, precomputes the sample regions and serves
//! `take_screenshot` on the command socket until SIGINT or SIGTERM.

use std::path::PathBuf;

use als_core::config::{Config, Directories};
use als_core::{Compositor, ResponseLayout, X11Compositor};
use als_daemon::{Startup, resolve_socket_path, run, shutdown_signal};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// ALS correction daemon - screen color sampler for ambient light correction
#[derive(Parser, Debug)]
#[command(name = "als-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to `$XDG_CONFIG_HOME/als-correction/config.json`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Sample anchor as "left top" in rotation-0 pixels
    #[arg(long, env = "ALS_CORRECTION_GRABRECT", value_name = "LEFT TOP")]
    grabrect: Option<String>,

    /// Custom socket path (defaults to `$XDG_RUNTIME_DIR/als_correction.sock`)
    #[arg(long, value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Panel width in rotation-0 pixels
    #[arg(long)]
    display_width: Option<i32>,

    /// Panel height in rotation-0 pixels
    #[arg(long)]
    display_height: Option<i32>,

    /// Half-size of the sample square in pixels
    #[arg(long)]
    radius: Option<i32>,

    /// Upper bound on a single capture
    #[arg(long, value_name = "MS")]
    capture_timeout_ms: Option<u64>,

    /// Reply frame layout: packed (20 bytes) or aligned (24 bytes)
    #[arg(long, value_name = "LAYOUT")]
    response_layout: Option<ResponseLayout>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(grabrect) = self.grabrect {
            config.grabrect = Some(grabrect);
        }
        if let Some(path) = self.socket_path {
            config.socket_path = Some(path);
        }
        if let Some(width) = self.display_width {
            config.display_width = width;
        }
        if let Some(height) = self.display_height {
            config.display_height = height;
        }
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        if let Some(timeout) = self.capture_timeout_ms {
            config.capture_timeout_ms = timeout;
        }
        if let Some(layout) = self.response_layout {
            config.response_layout = layout;
        }
    }
}

/// Set up logging with file output for debugging.
/// In debug builds, defaults to debug level and logs to timestamped file.
/// In release builds, defaults to info level and logs to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("als={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("als-daemon-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        let symlink_path = temp_dir.join("als-daemon.log");
        let _ = std::fs::remove_file(&symlink_path);
        let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> als_core::Result<Config> {
    let path = path.cloned().unwrap_or_else(Directories::default_config_file);
    info!("Loading config from {}", path.display());
    Config::load(&path)
}

fn connect_compositor() -> als_core::Result<Box<dyn Compositor>> {
    Ok(Box::new(X11Compositor::connect()?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_logging();

    info!("Starting ALS correction daemon...");

    let mut config = load_config(args.config.as_ref()).inspect_err(|e| {
        error!("Failed to load config: {}", e);
    })?;
    args.apply(&mut config);
    info!("Socket path: {}", resolve_socket_path(&config).display());

    match run(&config, connect_compositor, shutdown_signal()).await {
        Ok(Startup::NotConfigured) => info!("Nothing to do, exiting"),
        Ok(Startup::Stopped) => info!("ALS correction daemon stopped"),
        Err(e) => {
            error!("Daemon failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
