//! X11 compositor backend.
//!
//! Rotation comes from RandR `GetScreenInfo` on the default screen and
//! captures are `GetImage` requests against the root window. The root
//! window already holds the composited frame in its logical orientation, so
//! the identity-transform request is satisfied as is. X11 has no notion of
//! secure layers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use als_types::Rotation;
use tracing::{debug, trace};
use x11rb::connection::{Connection as _, RequestConnection as _};
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{ConnectionExt as _, ImageFormat, ImageOrder};
use x11rb::rust_connection::RustConnection;

use super::{CaptureOutcome, CaptureRequest, Compositor, DisplayId, PendingCapture};
use crate::buffer::{CaptureBuffer, PixelFormat};
use crate::{Error, Result};

/// Pixmap layout for one depth, from the connection setup.
#[derive(Debug, Clone, Copy)]
struct PixmapFormat {
    bits_per_pixel: u8,
    scanline_pad: u8,
}

#[derive(Debug)]
struct ScreenInfo {
    root: u32,
    byte_order: ImageOrder,
    pixmap_formats: HashMap<u8, PixmapFormat>,
    /// Red channel mask per visual id.
    red_masks: HashMap<u32, u32>,
}

/// At most one `GetImage` outstanding at a time.
///
/// A capture that timed out keeps its blocking thread until the server
/// answers, so new captures are refused until then instead of parking more
/// threads.
#[derive(Debug, Default, Clone)]
struct InFlight(Arc<AtomicBool>);

/// Clears the in-flight flag when the grab finishes.
#[derive(Debug)]
struct InFlightGuard(Arc<AtomicBool>);

impl InFlight {
    fn try_acquire(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.0.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Compositor backed by an X server connection.
pub struct X11Compositor {
    conn: Arc<RustConnection>,
    screen: Arc<ScreenInfo>,
    in_flight: InFlight,
}

impl std::fmt::Debug for X11Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Compositor")
            .field("root", &self.screen.root)
            .finish_non_exhaustive()
    }
}

fn platform_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Platform(format!("{context}: {err}"))
}

impl X11Compositor {
    /// Connect to the X server named by `$DISPLAY`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Platform` if the connection fails or the server lacks
    /// the RandR extension.
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| platform_err("X11 connect failed", e))?;

        conn.extension_information(randr::X11_EXTENSION_NAME)
            .map_err(|e| platform_err("RandR query failed", e))?
            .ok_or_else(|| Error::Platform("X server has no RandR extension".to_string()))?;
        let version = conn
            .randr_query_version(1, 2)
            .map_err(|e| platform_err("RandR version request failed", e))?
            .reply()
            .map_err(|e| platform_err("RandR version reply failed", e))?;
        debug!(
            "RandR {}.{} available",
            version.major_version, version.minor_version
        );

        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::Platform(format!("X screen {screen_num} does not exist")))?;

        let pixmap_formats = setup
            .pixmap_formats
            .iter()
            .map(|f| {
                (
                    f.depth,
                    PixmapFormat {
                        bits_per_pixel: f.bits_per_pixel,
                        scanline_pad: f.scanline_pad,
                    },
                )
            })
            .collect();

        let red_masks = screen
            .allowed_depths
            .iter()
            .flat_map(|d| d.visuals.iter())
            .map(|v| (v.visual_id, v.red_mask))
            .collect();

        let info = ScreenInfo {
            root: screen.root,
            byte_order: setup.image_byte_order,
            pixmap_formats,
            red_masks,
        };
        debug!(
            "Connected to X screen {} (root 0x{:x}, {}x{})",
            screen_num, info.root, screen.width_in_pixels, screen.height_in_pixels
        );

        Ok(Self {
            conn: Arc::new(conn),
            screen: Arc::new(info),
            in_flight: InFlight::default(),
        })
    }
}

fn rotation_from_randr(raw: randr::Rotation) -> Rotation {
    let bits = u16::from(raw);
    if bits & u16::from(randr::Rotation::ROTATE90) != 0 {
        Rotation::Rot90
    } else if bits & u16::from(randr::Rotation::ROTATE180) != 0 {
        Rotation::Rot180
    } else if bits & u16::from(randr::Rotation::ROTATE270) != 0 {
        Rotation::Rot270
    } else {
        Rotation::Rot0
    }
}

fn pixel_format(byte_order: ImageOrder, red_mask: u32) -> Option<PixelFormat> {
    match (byte_order, red_mask) {
        (ImageOrder::LSB_FIRST, 0x00ff_0000) => Some(PixelFormat::Bgrx8888),
        (ImageOrder::LSB_FIRST, 0x0000_00ff) => Some(PixelFormat::Rgbx8888),
        _ => None,
    }
}

/// Blocking `GetImage` of the requested region, converted to a buffer.
fn grab(conn: &RustConnection, screen: &ScreenInfo, request: &CaptureRequest) -> CaptureOutcome {
    match try_grab(conn, screen, request) {
        Ok(buffer) => CaptureOutcome::Success(buffer),
        Err(e) => CaptureOutcome::Failure(e.to_string()),
    }
}

fn try_grab(
    conn: &RustConnection,
    screen: &ScreenInfo,
    request: &CaptureRequest,
) -> Result<CaptureBuffer> {
    let src = request.source;
    let out_of_range = |what: &str| Error::Capture(format!("{what} of {src} out of X11 range"));
    let x = i16::try_from(src.left).map_err(|_| out_of_range("left"))?;
    let y = i16::try_from(src.top).map_err(|_| out_of_range("top"))?;
    let width = u16::try_from(src.width()).map_err(|_| out_of_range("width"))?;
    let height = u16::try_from(src.height()).map_err(|_| out_of_range("height"))?;

    let reply = conn
        .get_image(ImageFormat::Z_PIXMAP, screen.root, x, y, width, height, !0)
        .map_err(|e| Error::Capture(format!("GetImage request failed: {e}")))?
        .reply()
        .map_err(|e| Error::Capture(format!("GetImage failed: {e}")))?;

    let layout = screen
        .pixmap_formats
        .get(&reply.depth)
        .copied()
        .ok_or_else(|| Error::Capture(format!("no pixmap format for depth {}", reply.depth)))?;
    if layout.bits_per_pixel != 32 {
        return Err(Error::Capture(format!(
            "unsupported {} bits per pixel",
            layout.bits_per_pixel
        )));
    }

    let red_mask = screen.red_masks.get(&reply.visual).copied().unwrap_or(0);
    let format = pixel_format(screen.byte_order, red_mask).ok_or_else(|| {
        Error::Capture(format!(
            "unsupported visual 0x{:x} (red mask 0x{red_mask:x})",
            reply.visual
        ))
    })?;

    let pad = u32::from(layout.scanline_pad.max(8));
    let row_bits = u32::from(width) * u32::from(layout.bits_per_pixel);
    let row_bytes = row_bits.div_ceil(pad) * pad / 8;
    let stride = row_bytes / 4;

    CaptureBuffer::new(
        u32::from(width),
        u32::from(height),
        stride,
        format,
        reply.data,
    )
}

impl Compositor for X11Compositor {
    fn internal_display(&self) -> Result<DisplayId> {
        Ok(DisplayId(u64::from(self.screen.root)))
    }

    fn rotation(&self, display: DisplayId) -> Result<Rotation> {
        let window = u32::try_from(display.0)
            .map_err(|_| Error::Platform(format!("{display} is not an X11 window")))?;
        let info = self
            .conn
            .randr_get_screen_info(window)
            .map_err(|e| platform_err("RandR GetScreenInfo request failed", e))?
            .reply()
            .map_err(|e| platform_err("RandR GetScreenInfo failed", e))?;
        Ok(rotation_from_randr(info.rotation))
    }

    fn capture(&self, request: CaptureRequest) -> Result<PendingCapture> {
        if request.source.is_empty() {
            return Err(Error::Capture(format!(
                "empty capture region {}",
                request.source
            )));
        }
        if request.width != request.source.width().unsigned_abs()
            || request.height != request.source.height().unsigned_abs()
        {
            trace!("X11 backend does not scale; capturing {} unscaled", request.source);
        }
        trace!(
            "Capturing {} (identity transform: {}, secure layers: {})",
            request.source, request.use_identity_transform, request.capture_secure_layers
        );

        let Some(guard) = self.in_flight.try_acquire() else {
            return Err(Error::Capture(
                "previous GetImage has not completed".to_string(),
            ));
        };

        let (tx, pending) = PendingCapture::channel();
        let conn = self.conn.clone();
        let screen = self.screen.clone();
        let job = move || {
            let outcome = grab(&conn, &screen, &request);
            drop(guard);
            let _ = tx.send(outcome);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(job)),
            Err(_) => job(),
        }

        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_randr() {
        assert_eq!(
            rotation_from_randr(randr::Rotation::ROTATE0),
            Rotation::Rot0
        );
        assert_eq!(
            rotation_from_randr(randr::Rotation::ROTATE90),
            Rotation::Rot90
        );
        assert_eq!(
            rotation_from_randr(randr::Rotation::ROTATE180),
            Rotation::Rot180
        );
        assert_eq!(
            rotation_from_randr(randr::Rotation::ROTATE270),
            Rotation::Rot270
        );
    }

    #[test]
    fn test_reflection_bits_do_not_change_rotation() {
        let raw = randr::Rotation::from(
            u16::from(randr::Rotation::ROTATE90) | u16::from(randr::Rotation::REFLECT_X),
        );
        assert_eq!(rotation_from_randr(raw), Rotation::Rot90);
        assert_eq!(
            rotation_from_randr(randr::Rotation::REFLECT_Y),
            Rotation::Rot0
        );
    }

    #[test]
    fn test_in_flight_refuses_second_grab_until_released() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_acquire().unwrap();
        assert!(in_flight.try_acquire().is_none());
        assert!(in_flight.clone().try_acquire().is_none());

        drop(guard);
        assert!(in_flight.try_acquire().is_some());
    }

    #[test]
    fn test_in_flight_released_by_job_on_another_thread() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_acquire().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(in_flight.try_acquire().is_some());
    }

    #[test]
    fn test_pixel_format_from_visual() {
        assert_eq!(
            pixel_format(ImageOrder::LSB_FIRST, 0x00ff_0000),
            Some(PixelFormat::Bgrx8888)
        );
        assert_eq!(
            pixel_format(ImageOrder::LSB_FIRST, 0x0000_00ff),
            Some(PixelFormat::Rgbx8888)
        );
        assert_eq!(pixel_format(ImageOrder::MSB_FIRST, 0x00ff_0000), None);
        assert_eq!(pixel_format(ImageOrder::LSB_FIRST, 0xf800), None);
    }
}
