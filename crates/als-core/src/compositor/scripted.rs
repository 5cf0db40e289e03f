//! In-memory compositor driven by a script of capture outcomes.
//!
//! Used by tests and benchmarks to exercise the engine and the daemon
//! without a display server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use als_types::Rotation;

use super::{
    CaptureCompleter, CaptureOutcome, CaptureRequest, Compositor, DisplayId, PendingCapture,
};
use crate::buffer::CaptureBuffer;
use crate::{Error, Result};

/// One scripted reaction to a capture request.
#[doc(hidden)]
#[derive(Debug)]
pub enum ScriptedCapture {
    /// Complete successfully with this buffer.
    Buffer(CaptureBuffer),
    /// Complete with a failure outcome.
    Fail(String),
    /// Reject the request before it starts.
    Reject(String),
    /// Never complete.
    Hang,
}

/// Capture requests remembered by a [`ScriptedHandle`]; older ones are
/// dropped first.
pub const REQUEST_HISTORY: usize = 1024;

#[derive(Debug)]
struct ScriptState {
    display: Option<DisplayId>,
    rotation: Option<Rotation>,
    fill: (u8, u8, u8),
    queue: VecDeque<ScriptedCapture>,
    requests: VecDeque<CaptureRequest>,
    held: Vec<CaptureCompleter>,
}

/// Compositor whose rotation and capture results are set by a
/// [`ScriptedHandle`].
///
/// With an empty script every capture succeeds with a buffer of the
/// requested size filled with the current fill color.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct ScriptedCompositor {
    state: Arc<Mutex<ScriptState>>,
}

/// Control side of a [`ScriptedCompositor`].
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<ScriptState>>,
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedCompositor {
    #[must_use]
    pub fn new() -> (Self, ScriptedHandle) {
        let state = Arc::new(Mutex::new(ScriptState {
            display: Some(DisplayId(0)),
            rotation: Some(Rotation::Rot0),
            fill: (0, 0, 0),
            queue: VecDeque::new(),
            requests: VecDeque::new(),
            held: Vec::new(),
        }));
        (
            Self {
                state: state.clone(),
            },
            ScriptedHandle { state },
        )
    }
}

impl ScriptedHandle {
    pub fn set_rotation(&self, rotation: Rotation) {
        lock(&self.state).rotation = Some(rotation);
    }

    /// Make rotation queries fail.
    pub fn fail_rotation(&self) {
        lock(&self.state).rotation = None;
    }

    /// Make the internal display disappear.
    pub fn remove_display(&self) {
        lock(&self.state).display = None;
    }

    /// Color used for captures when the script is empty.
    pub fn set_fill(&self, red: u8, green: u8, blue: u8) {
        lock(&self.state).fill = (red, green, blue);
    }

    /// Queue the reaction to a future capture request.
    pub fn push(&self, capture: ScriptedCapture) {
        lock(&self.state).queue.push_back(capture);
    }

    /// The most recent capture requests, oldest first, at most
    /// [`REQUEST_HISTORY`] of them.
    #[must_use]
    pub fn requests(&self) -> Vec<CaptureRequest> {
        lock(&self.state).requests.iter().cloned().collect()
    }

    /// Remove and return the remembered capture requests.
    pub fn take_requests(&self) -> Vec<CaptureRequest> {
        lock(&self.state).requests.drain(..).collect()
    }
}

impl Compositor for ScriptedCompositor {
    fn internal_display(&self) -> Result<DisplayId> {
        lock(&self.state)
            .display
            .ok_or_else(|| Error::Platform("no physical displays".to_string()))
    }

    fn rotation(&self, display: DisplayId) -> Result<Rotation> {
        lock(&self.state)
            .rotation
            .ok_or_else(|| Error::Platform(format!("cannot query state of {display}")))
    }

    fn capture(&self, request: CaptureRequest) -> Result<PendingCapture> {
        let mut state = lock(&self.state);
        if state.requests.len() == REQUEST_HISTORY {
            state.requests.pop_front();
        }
        state.requests.push_back(request.clone());

        let outcome = match state.queue.pop_front() {
            Some(ScriptedCapture::Buffer(buffer)) => CaptureOutcome::Success(buffer),
            Some(ScriptedCapture::Fail(reason)) => CaptureOutcome::Failure(reason),
            Some(ScriptedCapture::Reject(reason)) => return Err(Error::Capture(reason)),
            Some(ScriptedCapture::Hang) => {
                let (tx, pending) = PendingCapture::channel();
                state.held.push(tx);
                return Ok(pending);
            }
            None => {
                let (r, g, b) = state.fill;
                CaptureOutcome::Success(CaptureBuffer::filled(
                    request.width,
                    request.height,
                    r,
                    g,
                    b,
                ))
            }
        };

        Ok(PendingCapture::ready(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::average;
    use als_types::{ChannelMeans, Rect};

    fn request() -> CaptureRequest {
        CaptureRequest::region(DisplayId(0), Rect::new(0, 0, 4, 2))
    }

    #[tokio::test]
    async fn test_empty_script_fills_requested_size() {
        let (compositor, handle) = ScriptedCompositor::new();
        handle.set_fill(9, 8, 7);

        let outcome = compositor.capture(request()).unwrap().await;
        let CaptureOutcome::Success(buffer) = outcome else {
            panic!("expected success");
        };
        assert_eq!((buffer.width(), buffer.height()), (4, 2));
        assert_eq!(average(&buffer), ChannelMeans::new(9, 8, 7));
    }

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let (compositor, handle) = ScriptedCompositor::new();
        handle.push(ScriptedCapture::Fail("first".to_string()));
        handle.push(ScriptedCapture::Reject("second".to_string()));

        assert!(matches!(
            compositor.capture(request()).unwrap().await,
            CaptureOutcome::Failure(_)
        ));
        assert!(compositor.capture(request()).is_err());
        assert!(matches!(
            compositor.capture(request()).unwrap().await,
            CaptureOutcome::Success(_)
        ));
        assert_eq!(handle.requests().len(), 3);
    }

    #[test]
    fn test_request_history_is_bounded() {
        let (compositor, handle) = ScriptedCompositor::new();
        for i in 0..REQUEST_HISTORY + 5 {
            let left = i32::try_from(i).unwrap();
            let rect = Rect::new(left, 0, left + 1, 1);
            drop(compositor.capture(CaptureRequest::region(DisplayId(0), rect)));
        }

        let requests = handle.requests();
        assert_eq!(requests.len(), REQUEST_HISTORY);
        assert_eq!(requests[0].source.left, 5);

        assert_eq!(handle.take_requests().len(), REQUEST_HISTORY);
        assert!(handle.requests().is_empty());
    }

    #[test]
    fn test_rotation_and_display_controls() {
        let (compositor, handle) = ScriptedCompositor::new();
        let display = compositor.internal_display().unwrap();

        handle.set_rotation(Rotation::Rot180);
        assert_eq!(compositor.rotation(display).unwrap(), Rotation::Rot180);

        handle.fail_rotation();
        assert!(compositor.rotation(display).is_err());

        handle.remove_display();
        assert!(compositor.internal_display().is_err());
    }
}
