//! ALS correction control CLI
//!
//! Talks to a running `als-daemon` over its command socket:
//! - Take one or more color samples
//! - Check whether the daemon answers
//! - Send raw commands
//! - Show the sample regions the current configuration resolves to

use std::path::PathBuf;
use std::time::Duration;

use als_core::config::{Config, Directories};
use als_core::{RegionTable, ResponseLayout};
use als_rpc::{AlsClient, Command, Reply, socket_path};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::time::sleep;

/// ALS correction control CLI
#[derive(Parser)]
#[command(name = "alsctl")]
#[command(about = "Query the ALS correction daemon")]
#[command(version)]
#[command(after_help = "\
Examples:
  alsctl sample                       Take one sample
  alsctl sample -n 10 -i 500          Ten samples, half a second apart
  alsctl sample --json                Print the sample as JSON
  alsctl status                       Check whether the daemon answers
  alsctl send take_screenshot         Send a raw command
  alsctl regions                      Show the configured sample rectangles
")]
struct Cli {
    /// Config file used to find the daemon's socket and frame layout
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Daemon socket (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Reply frame layout: packed or aligned (overrides the config file)
    #[arg(long, global = true, value_name = "LAYOUT")]
    layout: Option<ResponseLayout>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request color samples
    Sample {
        /// Number of samples to take
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Delay between samples
        #[arg(short, long, value_name = "MS", default_value_t = 1000)]
        interval_ms: u64,

        /// Print one JSON object per sample
        #[arg(long)]
        json: bool,
    },

    /// Check whether the daemon is answering
    Status,

    /// Send a raw command and print the reply
    Send {
        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },

    /// Print the sample rectangle for every rotation
    Regions {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where and how to reach the daemon.
struct Target {
    config: Config,
    socket: PathBuf,
    layout: ResponseLayout,
}

impl Target {
    fn resolve(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(Directories::default_config_file);
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let socket = cli
            .socket
            .clone()
            .or_else(|| config.socket_path.clone())
            .unwrap_or_else(socket_path);
        let layout = cli.layout.unwrap_or(config.response_layout);

        Ok(Self {
            config,
            socket,
            layout,
        })
    }

    async fn connect(&self) -> Result<AlsClient> {
        if !self.socket.exists() {
            bail!(
                "Daemon not running (socket not found at {}).\nStart with: als-daemon",
                self.socket.display()
            );
        }

        AlsClient::connect_to(&self.socket, self.layout)
            .await
            .context("Failed to connect to daemon. Is it running?")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let target = Target::resolve(&cli)?;

    match cli.command {
        Commands::Sample {
            count,
            interval_ms,
            json,
        } => run_sample(&target, count, Duration::from_millis(interval_ms), json).await,
        Commands::Status => run_status(&target).await,
        Commands::Send { words } => run_send(&target, &words).await,
        Commands::Regions { json } => run_regions(&target.config, json),
    }
}

async fn run_sample(target: &Target, count: u32, interval: Duration, json: bool) -> Result<()> {
    let mut client = target.connect().await?;

    for i in 0..count {
        if i > 0 {
            sleep(interval).await;
        }
        let sample = client
            .take_screenshot()
            .await
            .context("take_screenshot failed")?;

        if json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            println!(
                "r={:<3} g={:<3} b={:<3} t={}ns",
                sample.red, sample.green, sample.blue, sample.timestamp_ns
            );
        }
    }

    Ok(())
}

async fn run_status(target: &Target) -> Result<()> {
    let mut client = target.connect().await?;
    let sample = client
        .take_screenshot()
        .await
        .context("Daemon is not answering")?;

    println!("Daemon: running");
    println!("Socket: {}", target.socket.display());
    println!("Layout: {:?} ({} bytes)", target.layout, target.layout.frame_len());
    println!(
        "Last sample: r={} g={} b={}",
        sample.red, sample.green, sample.blue
    );
    Ok(())
}

async fn run_send(target: &Target, words: &[String]) -> Result<()> {
    let line = words.join(" ");
    let command = Command::parse(&line).context("Command is empty")?;
    let mut client = target.connect().await?;

    match client.send(command).await? {
        Reply::Sample(sample) => println!("{}", serde_json::to_string_pretty(&sample)?),
        Reply::Status { code, message } => println!("{code} {message}"),
    }
    Ok(())
}

fn run_regions(config: &Config, json: bool) -> Result<()> {
    config.validate()?;
    let Some(anchor) = config.anchor()? else {
        bail!("grabrect is not configured");
    };
    let regions = RegionTable::new(anchor, config.radius, config.display())?;

    if json {
        let table: Vec<_> = regions
            .iter()
            .map(|(rotation, rect)| {
                serde_json::json!({ "rotation": rotation.degrees(), "rect": rect })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        for (rotation, rect) in regions.iter() {
            println!(
                "{rotation}: left={} top={} right={} bottom={}",
                rect.left, rect.top, rect.right, rect.bottom
            );
        }
    }
    Ok(())
}
