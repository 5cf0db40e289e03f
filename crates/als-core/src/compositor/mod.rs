//! Compositor capture seam.
//!
//! The engine talks to the display compositor only through [`Compositor`].
//! A capture is started synchronously and completes later through a
//! [`PendingCapture`], mirroring platform screenshot APIs that deliver the
//! buffer to a listener.

mod scripted;
mod x11;

pub use scripted::{ScriptedCapture, ScriptedCompositor, ScriptedHandle};
pub use x11::X11Compositor;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use als_types::{Rect, Rotation};
use tokio::sync::oneshot;

use crate::Result;
use crate::buffer::{CaptureBuffer, PixelFormat};

/// Opaque handle for a physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId(pub u64);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display#{}", self.0)
    }
}

/// Parameters for one region capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub display: DisplayId,
    pub source: Rect,
    pub pixel_format: PixelFormat,
    /// Output size; equal to the source size for an unscaled capture.
    pub width: u32,
    pub height: u32,
    /// Return pixels as composited, without applying the display rotation.
    pub use_identity_transform: bool,
    /// Include secure (protected) layers instead of blacking them out.
    pub capture_secure_layers: bool,
}

impl CaptureRequest {
    /// Unscaled, identity-transform RGBA capture of `source` that includes
    /// secure layers.
    #[must_use]
    pub fn region(display: DisplayId, source: Rect) -> Self {
        Self {
            display,
            source,
            pixel_format: PixelFormat::Rgba8888,
            width: source.width().unsigned_abs(),
            height: source.height().unsigned_abs(),
            use_identity_transform: true,
            capture_secure_layers: true,
        }
    }
}

/// Completion value of a capture.
#[derive(Debug)]
pub enum CaptureOutcome {
    Success(CaptureBuffer),
    Failure(String),
}

/// Sending half of a capture completion, held by the backend.
pub type CaptureCompleter = oneshot::Sender<CaptureOutcome>;

/// A capture that has been issued and not yet completed.
///
/// Resolves to the backend's outcome, or to a failure if the backend drops
/// the completer without answering.
#[derive(Debug)]
pub struct PendingCapture {
    rx: oneshot::Receiver<CaptureOutcome>,
}

impl PendingCapture {
    /// Create a pending capture and the completer that finishes it.
    #[must_use]
    pub fn channel() -> (CaptureCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A capture that has already finished.
    #[must_use]
    pub fn ready(outcome: CaptureOutcome) -> Self {
        let (tx, pending) = Self::channel();
        // The receiver is alive in `pending`, so this cannot fail.
        let _ = tx.send(outcome);
        pending
    }
}

impl Future for PendingCapture {
    type Output = CaptureOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.unwrap_or_else(|_| {
                CaptureOutcome::Failure("capture completer dropped without a result".to_string())
            })
        })
    }
}

/// Display compositor able to report rotation and capture screen regions.
pub trait Compositor: Send + Sync {
    /// The built-in panel (first physical display).
    ///
    /// # Errors
    ///
    /// Returns an error if no physical display is available.
    fn internal_display(&self) -> Result<DisplayId>;

    /// Current logical rotation of `display`.
    ///
    /// # Errors
    ///
    /// Returns an error if the display state cannot be queried.
    fn rotation(&self, display: DisplayId) -> Result<Rotation>;

    /// Start a capture. The returned future resolves once the compositor has
    /// produced the buffer or given up.
    ///
    /// # Errors
    ///
    /// Returns an error if the compositor rejects the request outright.
    fn capture(&self, request: CaptureRequest) -> Result<PendingCapture>;
}
