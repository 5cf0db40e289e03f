//! Sample region resolution.
//!
//! The ALS sits at one fixed physical spot behind the panel. The compositor
//! captures in the display's current logical orientation, so the rectangle
//! covering that spot moves when the device rotates. [`RegionTable`] holds
//! the rectangle for each rotation, computed once at startup.

use crate::{Error, Result};
use als_types::{Rect, Rotation};
use tracing::info;

/// Largest panel edge accepted, in pixels.
pub const MAX_DISPLAY_DIMENSION: i32 = 65_535;

/// Sensor location in rotation-0 display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
}

/// Physical panel size in its natural (rotation-0) orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayDimensions {
    pub width: i32,
    pub height: i32,
}

impl DisplayDimensions {
    /// Logical size of the display in the given rotation.
    #[must_use]
    pub const fn rotated(self, rotation: Rotation) -> (i32, i32) {
        if rotation.is_landscape() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Immutable per-rotation lookup of sample rectangles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable {
    rects: [Rect; 4],
}

impl RegionTable {
    /// Build the table for `anchor`, sampling a square of side `2 * radius`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the radius or dimensions are not positive,
    /// or if any rotation's rectangle would fall outside the display.
    pub fn new(anchor: Anchor, radius: i32, display: DisplayDimensions) -> Result<Self> {
        if radius <= 0 {
            return Err(Error::Config(format!(
                "sample radius must be positive, got {radius}"
            )));
        }
        if !(1..=MAX_DISPLAY_DIMENSION).contains(&display.width)
            || !(1..=MAX_DISPLAY_DIMENSION).contains(&display.height)
        {
            return Err(Error::Config(format!(
                "display dimensions must be within 1..={MAX_DISPLAY_DIMENSION}, got {}x{}",
                display.width, display.height
            )));
        }
        if radius > display.width.min(display.height) {
            return Err(Error::Config(format!(
                "sample radius {radius} is larger than the {}x{} display",
                display.width, display.height
            )));
        }

        let Anchor { x, y } = anchor;
        if !(0..=display.width).contains(&x) || !(0..=display.height).contains(&y) {
            return Err(Error::Config(format!(
                "anchor ({x}, {y}) is outside the {}x{} display",
                display.width, display.height
            )));
        }
        let w = display.width;
        let h = display.height;

        let rects = [
            Rect::around(x, y, radius),
            Rect::around(y, w - x, radius),
            Rect::around(w - x, h - y, radius),
            Rect::around(h - y, x, radius),
        ];

        for rotation in Rotation::ALL {
            let rect = rects[rotation.index()];
            let (bound_w, bound_h) = display.rotated(rotation);
            if rect.is_empty() || !rect.fits_within(bound_w, bound_h) {
                return Err(Error::Config(format!(
                    "sample region {rect} for {rotation} lies outside the {bound_w}x{bound_h} display"
                )));
            }
        }

        Ok(Self { rects })
    }

    /// Rectangle to capture while the display is in `rotation`.
    #[must_use]
    pub fn get(&self, rotation: Rotation) -> Rect {
        self.rects[rotation.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rotation, Rect)> + '_ {
        Rotation::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    pub fn log_regions(&self) {
        for (rotation, rect) in self.iter() {
            info!(
                "Screenshot grab area {}: {} {} {} {}",
                rotation, rect.left, rect.right, rect.top, rect.bottom
            );
        }
    }
}
