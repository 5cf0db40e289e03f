//! Captured pixel buffers and the averaging reduction.

use crate::{Error, Result};
use als_types::ChannelMeans;

/// Byte order of a 4-byte pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Rgbx8888,
    Bgra8888,
    Bgrx8888,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Byte offsets of red, green and blue within one pixel.
    #[must_use]
    pub const fn channel_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => (0, 1, 2),
            PixelFormat::Bgra8888 | PixelFormat::Bgrx8888 => (2, 1, 0),
        }
    }
}

/// Pixels delivered by one capture.
///
/// `stride` is the row pitch in pixels and may exceed `width` when the
/// producer pads rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl CaptureBuffer {
    /// Wrap raw pixel storage.
    ///
    /// # Errors
    ///
    /// Returns `Error::Buffer` if the stride is narrower than a row or the
    /// storage is too short for `height` rows.
    pub fn new(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        if stride < width {
            return Err(Error::Buffer(format!(
                "stride {stride} is smaller than width {width}"
            )));
        }

        let required = required_len(width, height, stride);
        if (data.len() as u64) < required {
            return Err(Error::Buffer(format!(
                "{} bytes cannot hold {width}x{height} pixels with stride {stride} (need {required})",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// Tightly packed buffer with every pixel set to (`red`, `green`, `blue`).
    #[must_use]
    pub fn filled(width: u32, height: u32, red: u8, green: u8, blue: u8) -> Self {
        let pixels = width as usize * height as usize;
        let data = [red, green, blue, 0xff].repeat(pixels);
        Self {
            width,
            height,
            stride: width,
            format: PixelFormat::Rgba8888,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Lock the buffer for reading. The view borrows the buffer until dropped.
    #[must_use]
    pub fn lock(&self) -> PixelView<'_> {
        PixelView { buffer: self }
    }
}

fn required_len(width: u32, height: u32, stride: u32) -> u64 {
    if width == 0 || height == 0 {
        return 0;
    }
    let bpp = PixelFormat::BYTES_PER_PIXEL as u64;
    (u64::from(height) - 1) * u64::from(stride) * bpp + u64::from(width) * bpp
}

/// Read access to a locked [`CaptureBuffer`].
#[derive(Debug)]
pub struct PixelView<'a> {
    buffer: &'a CaptureBuffer,
}

impl PixelView<'_> {
    /// Rows of visible pixels, without stride padding.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let bpp = PixelFormat::BYTES_PER_PIXEL;
        let row_bytes = self.buffer.width as usize * bpp;
        let pitch = self.buffer.stride as usize * bpp;
        (0..self.buffer.height as usize).map(move |y| {
            let start = y * pitch;
            &self.buffer.data[start..start + row_bytes]
        })
    }
}

/// Per-channel sums over a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSums {
    pub red: u64,
    pub green: u64,
    pub blue: u64,
    pub pixels: u64,
}

impl ChannelSums {
    /// Integer mean of each channel; an empty sum averages to zero.
    // Each sum is at most 255 * pixels, so the quotient fits in u8 and therefore u32.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn means(&self) -> ChannelMeans {
        if self.pixels == 0 {
            return ChannelMeans::default();
        }
        ChannelMeans::new(
            (self.red / self.pixels) as u32,
            (self.green / self.pixels) as u32,
            (self.blue / self.pixels) as u32,
        )
    }
}

/// Sum the raw channel bytes of every pixel in `buffer`.
///
/// Values are summed in their stored encoding; no gamma decoding.
#[must_use]
pub fn sum_channels(buffer: &CaptureBuffer) -> ChannelSums {
    let (r, g, b) = buffer.format.channel_offsets();
    let view = buffer.lock();

    let mut sums = ChannelSums {
        pixels: u64::from(buffer.width) * u64::from(buffer.height),
        ..ChannelSums::default()
    };
    for row in view.rows() {
        for px in row.chunks_exact(PixelFormat::BYTES_PER_PIXEL) {
            sums.red += u64::from(px[r]);
            sums.green += u64::from(px[g]);
            sums.blue += u64::from(px[b]);
        }
    }
    sums
}

/// Mean red, green and blue of `buffer`, dividing by the buffer's own
/// width times height.
#[must_use]
pub fn average(buffer: &CaptureBuffer) -> ChannelMeans {
    sum_channels(buffer).means()
}
