//! Tests for the capture-and-average engine
//!
//! Covers:
//! - Rotation-driven region selection
//! - Averaging of fresh captures
//! - Stale and zero fallbacks on every failure path
//! - Bounded waits on captures that never complete

use std::time::Duration;

use crate::buffer::{CaptureBuffer, PixelFormat};
use crate::compositor::ScriptedCapture;
use crate::engine::SampleSource;
use crate::{ChannelMeans, Rect, Rotation};

use super::fixtures::{scripted_engine, scripted_engine_with_timeout};

#[tokio::test]
async fn test_uniform_capture_returns_exact_color() {
    let (mut engine, handle) = scripted_engine();
    handle.set_fill(12, 34, 56);

    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Fresh);
    assert_eq!(sample.result.means(), ChannelMeans::new(12, 34, 56));
    assert!(sample.result.timestamp_ns > 0);
}

#[tokio::test]
async fn test_black_capture_returns_zero() {
    let (mut engine, handle) = scripted_engine();
    handle.push(ScriptedCapture::Buffer(CaptureBuffer::filled(80, 80, 0, 0, 0)));

    let result = engine.sample().await;
    assert_eq!(result.means(), ChannelMeans::default());
}

#[tokio::test]
async fn test_rotation_selects_region() {
    let (mut engine, handle) = scripted_engine();
    let expected = [
        (Rotation::Rot0, Rect::new(460, 760, 540, 840)),
        (Rotation::Rot90, Rect::new(760, 540, 840, 620)),
        (Rotation::Rot180, Rect::new(540, 1560, 620, 1640)),
        (Rotation::Rot270, Rect::new(1560, 460, 1640, 540)),
    ];

    for (rotation, _) in expected {
        handle.set_rotation(rotation);
        engine.sample().await;
    }

    let requests = handle.requests();
    assert_eq!(requests.len(), 4);
    for (request, (rotation, rect)) in requests.iter().zip(expected) {
        assert_eq!(request.source, rect, "{rotation}");
        assert_eq!((request.width, request.height), (80, 80));
        assert!(request.use_identity_transform);
        assert!(request.capture_secure_layers);
    }
}

#[tokio::test]
async fn test_rotation_read_fresh_each_request() {
    let (mut engine, handle) = scripted_engine();

    engine.sample().await;
    handle.set_rotation(Rotation::Rot90);
    engine.sample().await;

    let requests = handle.requests();
    assert_eq!(requests[0].source, engine.regions().get(Rotation::Rot0));
    assert_eq!(requests[1].source, engine.regions().get(Rotation::Rot90));
}

#[tokio::test]
async fn test_failed_rotation_query_uses_rotation_0() {
    let (mut engine, handle) = scripted_engine();
    handle.fail_rotation();

    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Fresh);
    assert_eq!(
        handle.requests()[0].source,
        engine.regions().get(Rotation::Rot0)
    );
}

#[tokio::test]
async fn test_failure_without_history_returns_zero() {
    let (mut engine, handle) = scripted_engine();
    handle.push(ScriptedCapture::Fail("compositor busy".to_string()));

    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Empty);
    assert_eq!(sample.result.means(), ChannelMeans::default());
    assert!(engine.last_good().is_none());
}

#[tokio::test]
async fn test_failure_reuses_last_good_sample() {
    let (mut engine, handle) = scripted_engine();
    handle.set_fill(100, 150, 200);
    let first = engine.sample().await;

    handle.push(ScriptedCapture::Fail("fence error".to_string()));
    let second = engine.sample_detailed().await;

    assert_eq!(second.source, SampleSource::Stale);
    assert_eq!(second.result.means(), first.means());
    assert!(second.result.timestamp_ns >= first.timestamp_ns);
}

#[tokio::test]
async fn test_rejected_capture_falls_back() {
    let (mut engine, handle) = scripted_engine();
    handle.set_fill(9, 9, 9);
    engine.sample().await;

    handle.push(ScriptedCapture::Reject("permission denied".to_string()));
    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Stale);
    assert_eq!(sample.result.means(), ChannelMeans::new(9, 9, 9));
}

#[tokio::test]
async fn test_missing_display_falls_back() {
    let (mut engine, handle) = scripted_engine();
    handle.remove_display();

    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Empty);
    assert!(handle.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_capture_times_out() {
    let (mut engine, handle) = scripted_engine_with_timeout(Duration::from_secs(5));
    handle.set_fill(1, 2, 3);
    engine.sample().await;

    handle.push(ScriptedCapture::Hang);
    let sample = engine.sample_detailed().await;
    assert_eq!(sample.source, SampleSource::Stale);
    assert_eq!(sample.result.means(), ChannelMeans::new(1, 2, 3));
}

#[tokio::test]
async fn test_fallback_does_not_overwrite_last_good() {
    let (mut engine, handle) = scripted_engine();
    handle.set_fill(40, 50, 60);
    engine.sample().await;

    handle.push(ScriptedCapture::Fail("first".to_string()));
    handle.push(ScriptedCapture::Fail("second".to_string()));
    engine.sample().await;
    let result = engine.sample().await;

    assert_eq!(result.means(), ChannelMeans::new(40, 50, 60));
    assert_eq!(engine.last_good(), Some(ChannelMeans::new(40, 50, 60)));
}

#[tokio::test]
async fn test_buffer_size_comes_from_capture() {
    let (mut engine, handle) = scripted_engine();
    // 2x1 buffer for an 80x80 request: the mean uses 2 pixels, not 6400.
    let data = vec![100, 0, 0, 0, 50, 0, 0, 0];
    let buffer = CaptureBuffer::new(2, 1, 2, PixelFormat::Rgbx8888, data).unwrap();
    handle.push(ScriptedCapture::Buffer(buffer));

    let result = engine.sample().await;
    assert_eq!(result.means(), ChannelMeans::new(75, 0, 0));
}

#[tokio::test]
async fn test_timestamps_non_decreasing() {
    let (mut engine, _handle) = scripted_engine();
    let first = engine.sample().await;
    let second = engine.sample().await;
    assert!(second.timestamp_ns >= first.timestamp_ns);
}
