//! Integration tests for the als-daemon socket server
//!
//! These tests run the real server on a temporary socket with a scripted
//! compositor and talk to it through the client and raw streams.

use std::path::{Path, PathBuf};
use std::time::Duration;

use als_core::compositor::{ScriptedCapture, ScriptedCompositor, ScriptedHandle};
use als_core::config::Config;
use als_core::{
    Anchor, CaptureEngine, ChannelMeans, Compositor, DisplayDimensions, RegionTable,
    ResponseLayout,
};
use als_daemon::{DaemonError, Startup, run, serve};
use als_rpc::{AlsClient, ClientError, Command, Reply};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A daemon serving on a temporary socket.
struct TestDaemon {
    _dir: TempDir,
    path: PathBuf,
    handle: ScriptedHandle,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<als_daemon::Result<()>>,
}

impl TestDaemon {
    async fn start(layout: ResponseLayout) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("als_correction.sock");
        let (compositor, handle) = ScriptedCompositor::new();
        let regions = RegionTable::new(
            Anchor { x: 500, y: 800 },
            40,
            DisplayDimensions {
                width: 1080,
                height: 2400,
            },
        )
        .unwrap();
        let engine = CaptureEngine::new(Box::new(compositor), regions, Duration::from_millis(200));

        let (stop, stopped) = oneshot::channel::<()>();
        let serve_path = path.clone();
        let task = tokio::spawn(async move {
            serve(engine, &serve_path, layout, async {
                let _ = stopped.await;
            })
            .await
        });

        wait_for_socket(&path).await;

        Self {
            _dir: dir,
            path,
            handle,
            stop: Some(stop),
            task,
        }
    }

    async fn client(&self, layout: ResponseLayout) -> AlsClient {
        AlsClient::connect_to(&self.path, layout).await.unwrap()
    }

    async fn shutdown(mut self) -> PathBuf {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
        self.path.clone()
    }
}

async fn wait_for_socket(path: &Path) {
    for _ in 0..100 {
        if UnixStream::connect(path).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon never started listening on {}", path.display());
}

/// Read one raw reply of exactly `len` bytes.
async fn read_exact_frame(stream: &mut UnixStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf
}

#[tokio::test]
async fn test_take_screenshot_returns_region_color() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    daemon.handle.set_fill(90, 120, 150);

    let mut client = daemon.client(ResponseLayout::Packed).await;
    let result = client.take_screenshot().await.unwrap();

    assert_eq!(result.means(), ChannelMeans::new(90, 120, 150));
    assert!(result.timestamp_ns > 0);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_consecutive_requests_have_non_decreasing_timestamps() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    let mut client = daemon.client(ResponseLayout::Packed).await;

    let first = client.take_screenshot().await.unwrap();
    let second = client.take_screenshot().await.unwrap();

    assert!(second.timestamp_ns >= first.timestamp_ns);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_capture_failure_returns_previous_color_in_full_frame() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    daemon.handle.set_fill(33, 66, 99);

    let mut stream = UnixStream::connect(&daemon.path).await.unwrap();
    stream.write_all(b"take_screenshot\0").await.unwrap();
    let good = read_exact_frame(&mut stream, 20).await;

    daemon
        .handle
        .push(ScriptedCapture::Fail("compositor busy".to_string()));
    stream.write_all(b"take_screenshot\0").await.unwrap();
    let stale = read_exact_frame(&mut stream, 20).await;

    assert_eq!(good[..12], stale[..12], "colors must repeat the last good sample");
    let good_ts = i64::from_ne_bytes(good[12..20].try_into().unwrap());
    let stale_ts = i64::from_ne_bytes(stale[12..20].try_into().unwrap());
    assert!(stale_ts >= good_ts);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_capture_failure_without_history_returns_zeros() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    daemon
        .handle
        .push(ScriptedCapture::Fail("no buffer".to_string()));

    let mut client = daemon.client(ResponseLayout::Packed).await;
    let result = client.take_screenshot().await.unwrap();

    assert_eq!(result.means(), ChannelMeans::default());
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_hung_capture_still_answers() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    daemon.handle.push(ScriptedCapture::Hang);

    let mut client = daemon
        .client(ResponseLayout::Packed)
        .await
        .with_timeout(Duration::from_secs(2));
    let result = client.take_screenshot().await.unwrap();

    assert_eq!(result.means(), ChannelMeans::default());
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_aligned_layout_frame_size() {
    let daemon = TestDaemon::start(ResponseLayout::Aligned).await;
    daemon.handle.set_fill(1, 2, 3);

    let mut stream = UnixStream::connect(&daemon.path).await.unwrap();
    stream.write_all(b"take_screenshot\0").await.unwrap();
    let frame = read_exact_frame(&mut stream, 24).await;

    assert_eq!(frame[0..4], 1u32.to_ne_bytes());
    assert_eq!(frame[12..16], [0, 0, 0, 0]);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_unknown_command_gets_status_reply() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;

    let mut stream = UnixStream::connect(&daemon.path).await.unwrap();
    stream.write_all(b"get_lux\0").await.unwrap();
    let reply = read_exact_frame(&mut stream, b"500 Command not recognized\0".len()).await;

    assert_eq!(reply, b"500 Command not recognized\0");
    assert!(daemon.handle.requests().is_empty());
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_multiple_commands_on_one_connection() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    let mut client = daemon.client(ResponseLayout::Packed).await;

    client.take_screenshot().await.unwrap();
    let reply = client.send(Command::new("bogus")).await.unwrap();
    assert_eq!(reply, Reply::not_recognized());
    client.take_screenshot().await.unwrap();

    assert_eq!(daemon.handle.requests().len(), 2);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_pipelined_commands_in_one_write() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;

    let mut stream = UnixStream::connect(&daemon.path).await.unwrap();
    stream
        .write_all(b"take_screenshot\0\0take_screenshot\0")
        .await
        .unwrap();
    read_exact_frame(&mut stream, 40).await;

    assert_eq!(daemon.handle.requests().len(), 2);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_oversized_command_closes_only_that_connection() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;

    let mut stream = UnixStream::connect(&daemon.path).await.unwrap();
    let _ = stream.write_all(&[b'x'; 5000]).await;
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)), "connection should be closed");

    let mut client = daemon.client(ResponseLayout::Packed).await;
    assert!(client.take_screenshot().await.is_ok());
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_clients_are_serialized() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    daemon.handle.set_fill(7, 7, 7);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let mut client = daemon.client(ResponseLayout::Packed).await;
        tasks.push(tokio::spawn(async move { client.take_screenshot().await }));
    }
    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.means(), ChannelMeans::new(7, 7, 7));
    }

    assert_eq!(daemon.handle.requests().len(), 4);
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_removes_socket() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    let path = daemon.shutdown().await;
    assert!(!path.exists());
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("als_correction.sock");
    drop(UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let config = Config {
        grabrect: Some("500 800".to_string()),
        socket_path: Some(path.clone()),
        ..Config::default()
    };
    let (compositor, _handle) = ScriptedCompositor::new();
    let result = run(
        &config,
        move || Ok(Box::new(compositor) as Box<dyn Compositor>),
        async {},
    )
    .await
    .unwrap();

    assert_eq!(result, Startup::Stopped);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_second_daemon_reports_already_running() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;

    let config = Config {
        grabrect: Some("500 800".to_string()),
        socket_path: Some(daemon.path.clone()),
        ..Config::default()
    };
    let (compositor, _handle) = ScriptedCompositor::new();
    let result = run(
        &config,
        move || Ok(Box::new(compositor) as Box<dyn Compositor>),
        async {},
    )
    .await;

    assert!(matches!(result, Err(DaemonError::AlreadyRunning(_))));
    let mut client = daemon.client(ResponseLayout::Packed).await;
    assert!(client.take_screenshot().await.is_ok());
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_not_configured_never_binds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("als_correction.sock");

    for grabrect in [
        None,
        Some(String::new()),
        Some("0 800".to_string()),
        Some("abc 800".to_string()),
    ] {
        let config = Config {
            grabrect,
            socket_path: Some(path.clone()),
            ..Config::default()
        };
        let result = run(
            &config,
            || panic!("compositor must not be opened when not configured"),
            async {},
        )
        .await
        .unwrap();

        assert_eq!(result, Startup::NotConfigured);
        assert!(!path.exists());
    }
}

#[tokio::test]
async fn test_malformed_anchor_is_error() {
    let config = Config {
        grabrect: Some("500 eight-hundred".to_string()),
        ..Config::default()
    };
    let result = run(&config, || panic!("not reached"), async {}).await;
    assert!(matches!(result, Err(DaemonError::Core(_))));
}

#[tokio::test]
async fn test_off_display_anchor_is_error() {
    let config = Config {
        grabrect: Some("5000 800".to_string()),
        ..Config::default()
    };
    let result = run(&config, || panic!("not reached"), async {}).await;
    assert!(matches!(result, Err(DaemonError::Core(_))));
}

#[tokio::test]
async fn test_compositor_connect_failure_is_error() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        grabrect: Some("500 800".to_string()),
        socket_path: Some(dir.path().join("als_correction.sock")),
        ..Config::default()
    };
    let result = run(
        &config,
        || Err(als_core::Error::Platform("no display server".to_string())),
        async {},
    )
    .await;

    assert!(matches!(result, Err(DaemonError::Core(_))));
    assert!(!dir.path().join("als_correction.sock").exists());
}

#[tokio::test]
async fn test_empty_command_gets_no_reply() {
    let daemon = TestDaemon::start(ResponseLayout::Packed).await;
    let mut client = daemon
        .client(ResponseLayout::Packed)
        .await
        .with_timeout(Duration::from_millis(200));

    let result = client.send(Command::new("")).await;
    assert!(matches!(result, Err(ClientError::Timeout(_))));
    assert!(daemon.handle.requests().is_empty());
    daemon.shutdown().await;
}
