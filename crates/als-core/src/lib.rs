//! Core of the ALS correction daemon: sample region resolution, compositor
//! capture and the averaging engine.

pub mod buffer;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod region;

mod error;
mod utils;

#[cfg(test)]
mod tests;

pub use buffer::{CaptureBuffer, PixelFormat, average};
pub use compositor::{Compositor, X11Compositor};
pub use engine::{CaptureEngine, Sample, SampleSource};
pub use error::{Error, Result};
pub use region::{Anchor, DisplayDimensions, RegionTable};
pub use utils::boot_time_ns;

pub use als_types::*;
