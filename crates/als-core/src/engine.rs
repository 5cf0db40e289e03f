//! Capture-and-average engine.

use std::time::Duration;

use als_types::{AverageResult, ChannelMeans, Rotation};
use tracing::{debug, trace, warn};

use crate::buffer::average;
use crate::compositor::{CaptureOutcome, CaptureRequest, Compositor};
use crate::region::RegionTable;
use crate::utils::boot_time_ns;
use crate::{Error, Result};

/// Where the colors of a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    /// A capture taken for this request.
    Fresh,
    /// The capture failed; the last good sample was reused.
    Stale,
    /// The capture failed and there has never been a good sample.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub result: AverageResult,
    pub source: SampleSource,
}

/// Produces one [`AverageResult`] per request from the compositor.
///
/// Owns the last successful sample, which is only written after a good
/// capture and only read when a capture fails.
pub struct CaptureEngine {
    compositor: Box<dyn Compositor>,
    regions: RegionTable,
    timeout: Duration,
    last_good: Option<ChannelMeans>,
}

impl CaptureEngine {
    #[must_use]
    pub fn new(compositor: Box<dyn Compositor>, regions: RegionTable, timeout: Duration) -> Self {
        Self {
            compositor,
            regions,
            timeout,
            last_good: None,
        }
    }

    #[must_use]
    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    #[must_use]
    pub fn last_good(&self) -> Option<ChannelMeans> {
        self.last_good
    }

    /// Capture the sample region and average it.
    ///
    /// Never fails: on a capture failure the last good colors (or zeros)
    /// are returned with a fresh timestamp.
    pub async fn sample(&mut self) -> AverageResult {
        self.sample_detailed().await.result
    }

    /// Like [`CaptureEngine::sample`], also reporting whether the colors
    /// are fresh.
    pub async fn sample_detailed(&mut self) -> Sample {
        let (means, source) = match self.capture_means().await {
            Ok(means) => {
                self.last_good = Some(means);
                (means, SampleSource::Fresh)
            }
            Err(e) => match self.last_good {
                Some(means) => {
                    warn!("Capture failed, reusing last good sample: {}", e);
                    (means, SampleSource::Stale)
                }
                None => {
                    warn!("Capture failed and no previous sample exists: {}", e);
                    (ChannelMeans::default(), SampleSource::Empty)
                }
            },
        };

        Sample {
            result: means.at(boot_time_ns()),
            source,
        }
    }

    async fn capture_means(&self) -> Result<ChannelMeans> {
        let display_id = self.compositor.internal_display()?;
        let rotation = self.compositor.rotation(display_id).unwrap_or_else(|e| {
            warn!("Failed to read rotation of {}, assuming rot=0: {}", display_id, e);
            Rotation::Rot0
        });

        let rect = self.regions.get(rotation);
        debug!("Capturing {} on {} ({})", rect, display_id, rotation);

        let pending = self
            .compositor
            .capture(CaptureRequest::region(display_id, rect))?;

        let buffer = match tokio::time::timeout(self.timeout, pending).await {
            Err(_) => return Err(Error::Timeout(self.timeout)),
            Ok(CaptureOutcome::Failure(reason)) => return Err(Error::Capture(reason)),
            Ok(CaptureOutcome::Success(buffer)) => buffer,
        };

        if buffer.width() != rect.width().unsigned_abs()
            || buffer.height() != rect.height().unsigned_abs()
        {
            debug!(
                "Compositor returned {}x{} for a {}x{} request",
                buffer.width(),
                buffer.height(),
                rect.width(),
                rect.height()
            );
        }

        let means = average(&buffer);
        trace!(
            "Averaged {}x{} (stride {}): {:?}",
            buffer.width(),
            buffer.height(),
            buffer.stride(),
            means
        );
        Ok(means)
    }
}

impl std::fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("regions", &self.regions)
            .field("timeout", &self.timeout)
            .field("last_good", &self.last_good)
            .finish_non_exhaustive()
    }
}
