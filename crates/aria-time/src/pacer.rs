//! Frame pacer - wall-clock deadlines for frame emission
//!
//! Frame `i` may be emitted no earlier than `start + (i + 1) / fps`. A frame
//! that is ready early waits for its deadline. A frame that is ready late is
//! released immediately. Frames are never dropped to catch up.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::clock::MediaClock;

/// Outcome of pacing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Frame was early and waited this long for its deadline
    OnTime(Duration),
    /// Frame missed its deadline by this much
    Late(Duration),
}

impl Pacing {
    pub fn is_late(&self) -> bool {
        matches!(self, Pacing::Late(_))
    }
}

/// Pacing statistics for one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacingStats {
    pub frames: u64,
    pub late_frames: u64,
    pub max_lateness: Duration,
    pub total_wait: Duration,
}

/// Deadline pacer anchored at stream start
#[derive(Debug)]
pub struct FramePacer {
    clock: MediaClock,
    start: Instant,
    stats: PacingStats,
}

impl FramePacer {
    /// Start pacing now
    pub fn start(clock: MediaClock) -> Self {
        Self::start_at(clock, Instant::now())
    }

    pub fn start_at(clock: MediaClock, start: Instant) -> Self {
        Self {
            clock,
            start,
            stats: PacingStats::default(),
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start
    }

    /// Earliest emission time of frame `index`
    pub fn deadline(&self, index: u64) -> Instant {
        self.start + self.clock.deadline_offset(index)
    }

    /// Suspend until frame `index` may be emitted.
    ///
    /// Cancellation safe: dropping the future before completion leaves the
    /// statistics untouched.
    pub async fn wait_for(&mut self, index: u64) -> Pacing {
        let deadline = self.deadline(index);
        let now = Instant::now();

        let pacing = if now < deadline {
            tokio::time::sleep_until(deadline).await;
            Pacing::OnTime(deadline - now)
        } else {
            Pacing::Late(now - deadline)
        };

        self.record(index, pacing);
        pacing
    }

    fn record(&mut self, index: u64, pacing: Pacing) {
        self.stats.frames += 1;
        match pacing {
            Pacing::OnTime(waited) => self.stats.total_wait += waited,
            Pacing::Late(lateness) => {
                self.stats.late_frames += 1;
                self.stats.max_lateness = self.stats.max_lateness.max(lateness);
                if lateness >= self.clock.frame_interval() {
                    warn!(
                        frame = index,
                        lateness_ms = lateness.as_secs_f64() * 1000.0,
                        "Frame missed its deadline by more than one interval"
                    );
                }
            }
        }
    }

    pub fn stats(&self) -> &PacingStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_30() -> MediaClock {
        MediaClock::new(30, 16_000).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_frames_wait_for_deadline() {
        let mut pacer = FramePacer::start(clock_30());
        let start = pacer.start_time();

        for i in 0..5u64 {
            let pacing = pacer.wait_for(i).await;
            assert!(!pacing.is_late());
            assert!(Instant::now() >= pacer.deadline(i));
        }
        assert!(Instant::now() - start >= Duration::from_millis(166));
        assert_eq!(pacer.stats().frames, 5);
        assert_eq!(pacer.stats().late_frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_frame_released_immediately() {
        let mut pacer = FramePacer::start(clock_30());
        tokio::time::advance(Duration::from_millis(100)).await;

        let before = Instant::now();
        // deadline of frame 1 is ~66.7 ms, we are at 100 ms
        let pacing = pacer.wait_for(1).await;
        assert!(pacing.is_late());
        assert_eq!(Instant::now(), before);

        // frame 2 is due at exactly 100 ms
        pacer.wait_for(2).await;
        assert_eq!(Instant::now(), before);
        // frame 3 is due at ~133 ms, so it waits again
        let pacing = pacer.wait_for(3).await;
        assert!(!pacing.is_late());
        assert!(Instant::now() >= pacer.deadline(3));

        let stats = pacer.stats();
        assert!(stats.late_frames >= 1);
        assert!(stats.max_lateness >= Duration::from_millis(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadlines_strictly_increase() {
        let pacer = FramePacer::start(clock_30());
        let deadlines: Vec<_> = (0..90).map(|i| pacer.deadline(i)).collect();
        assert!(deadlines.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(deadlines[29] - pacer.start_time(), Duration::from_secs(1));
    }
}
