//! Shared types for the ALS correction daemon components.
//!
//! This crate provides the value types used across als-core, als-rpc,
//! als-daemon, and als-cli. All types are plain data and serializable so
//! they can be logged or printed as JSON by the control CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in physical display pixels.
///
/// `right` and `bottom` are exclusive, so a rectangle built from a center
/// point and a radius `r` is `2r` pixels wide and tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Square of side `2 * radius` centered on (`cx`, `cy`).
    #[must_use]
    pub const fn around(cx: i32, cy: i32, radius: i32) -> Self {
        Self::new(cx - radius, cy - radius, cx + radius, cy + radius)
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[must_use]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Whether this rectangle lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub const fn fits_within(&self, width: i32, height: i32) -> bool {
        self.left >= 0 && self.top >= 0 && self.right <= width && self.bottom <= height
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Logical orientation of the display at the moment of capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Rot0,
        Rotation::Rot90,
        Rotation::Rot180,
        Rotation::Rot270,
    ];

    /// Map a raw quarter-turn count to a rotation.
    ///
    /// Values other than 0..=3 are not a known orientation and map to
    /// [`Rotation::Rot0`].
    #[must_use]
    pub const fn from_quarter_turns(turns: u32) -> Self {
        match turns {
            1 => Rotation::Rot90,
            2 => Rotation::Rot180,
            3 => Rotation::Rot270,
            _ => Rotation::Rot0,
        }
    }

    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Rotation::Rot0 => 0,
            Rotation::Rot90 => 90,
            Rotation::Rot180 => 180,
            Rotation::Rot270 => 270,
        }
    }

    /// Table index for this rotation (0..4).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Rotation::Rot0 => 0,
            Rotation::Rot90 => 1,
            Rotation::Rot180 => 2,
            Rotation::Rot270 => 3,
        }
    }

    /// 90 and 270 degree rotations swap the display's width and height.
    #[must_use]
    pub const fn is_landscape(self) -> bool {
        matches!(self, Rotation::Rot90 | Rotation::Rot270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rot={}", self.degrees())
    }
}

/// Per-channel mean of a captured region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelMeans {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl ChannelMeans {
    #[must_use]
    pub const fn new(red: u32, green: u32, blue: u32) -> Self {
        Self { red, green, blue }
    }

    /// Attach a capture timestamp.
    #[must_use]
    pub const fn at(self, timestamp_ns: i64) -> AverageResult {
        AverageResult {
            red: self.red,
            green: self.green,
            blue: self.blue,
            timestamp_ns,
        }
    }
}

/// Reply to a `take_screenshot` command.
///
/// `timestamp_ns` is read from the boot-relative monotonic clock, so it
/// keeps counting across suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageResult {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub timestamp_ns: i64,
}

impl AverageResult {
    #[must_use]
    pub const fn means(&self) -> ChannelMeans {
        ChannelMeans::new(self.red, self.green, self.blue)
    }
}

/// Byte layout of an [`AverageResult`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLayout {
    /// Fields back to back: 3 x u32 then i64, 20 bytes.
    ///
    /// Clients that read `sizeof` of a C struct holding these four fields
    /// get 24 on common 64-bit and 32-bit ABIs and need [`Aligned`] instead.
    ///
    /// [`Aligned`]: ResponseLayout::Aligned
    #[default]
    Packed,
    /// C struct layout with the i64 aligned to 8 bytes: 4 padding bytes
    /// after `blue`, 24 bytes.
    ///
    /// This is what an existing sensor HAL reading a native
    /// `{ u32, u32, u32, i64 }` struct expects; set
    /// `responseLayout: "aligned"` for such clients.
    Aligned,
}

impl ResponseLayout {
    #[must_use]
    pub const fn frame_len(self) -> usize {
        match self {
            ResponseLayout::Packed => 20,
            ResponseLayout::Aligned => 24,
        }
    }

    /// Byte offset of `timestamp_ns` within the frame.
    #[must_use]
    pub const fn timestamp_offset(self) -> usize {
        match self {
            ResponseLayout::Packed => 12,
            ResponseLayout::Aligned => 16,
        }
    }
}

impl std::str::FromStr for ResponseLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packed" => Ok(ResponseLayout::Packed),
            "aligned" => Ok(ResponseLayout::Aligned),
            other => Err(format!(
                "unknown response layout '{other}' (expected 'packed' or 'aligned')"
            )),
        }
    }
}
