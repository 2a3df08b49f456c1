//! Rendering statistics

use std::time::Duration;

use serde::Serialize;

/// Counters accumulated across all streams of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderStats {
    pub streams_started: u64,
    pub streams_completed: u64,
    pub streams_failed: u64,
    pub streams_cancelled: u64,
    pub frames_emitted: u64,
    /// Frame attempts repeated after a processing error
    pub retries: u64,
    /// Frames released after their deadline
    pub late_frames: u64,
    pub max_lateness: Duration,
    /// Wall time spent computing the most recent frame
    pub last_frame_compute: Duration,
}

impl RenderStats {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
