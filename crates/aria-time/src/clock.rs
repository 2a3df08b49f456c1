//! Media clock - samples, frames and media time

use std::time::Duration;

use aria_core::{AriaError, AriaResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Maps audio length to frame count and frame index to media time.
///
/// All conversions are done in integer arithmetic so frame counts never
/// suffer from floating-point rounding at exact boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaClock {
    frame_rate: u32,
    sample_rate: u32,
}

impl MediaClock {
    pub fn new(frame_rate: u32, sample_rate: u32) -> AriaResult<Self> {
        if frame_rate == 0 || sample_rate == 0 {
            return Err(AriaError::InvalidConfig(format!(
                "frame_rate and sample_rate must be > 0, got {frame_rate} / {sample_rate}"
            )));
        }
        Ok(Self {
            frame_rate,
            sample_rate,
        })
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// `floor(num_samples / sample_rate * frame_rate)`
    pub fn total_frames(&self, num_samples: usize) -> u64 {
        (num_samples as u128 * self.frame_rate as u128 / self.sample_rate as u128) as u64
    }

    /// Media time of frame `index` in seconds (`index / frame_rate`)
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 / self.frame_rate as f64
    }

    /// Nominal duration of one frame
    pub fn frame_interval(&self) -> Duration {
        self.deadline_offset(0)
    }

    /// Offset from stream start at which frame `index` may be emitted:
    /// `(index + 1) / frame_rate`, rounded up to the nanosecond
    pub fn deadline_offset(&self, index: u64) -> Duration {
        let fps = self.frame_rate as u128;
        let nanos = ((index as u128 + 1) * NANOS_PER_SEC + fps - 1) / fps;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}
