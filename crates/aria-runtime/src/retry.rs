//! Per-frame retry policy
//!
//! | error kind    | action                                   |
//! |---------------|------------------------------------------|
//! | Processing    | retry while `attempt <= max_retries`     |
//! | GpuMemory     | release accelerator memory, then fail    |
//! | anything else | fail immediately                         |

use aria_core::{AriaError, ErrorKind};

/// Default number of retries for a failing frame
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// What the render loop does after a failed frame attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the same frame again
    Retry,
    /// Release accelerator memory, then end the stream with the error
    ReleaseAndFail,
    /// End the stream with the error
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Upper bound on attempts per frame
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decide after attempt number `attempt` (1-based) failed with `error`
    pub fn decide(&self, error: &AriaError, attempt: u32) -> RetryDecision {
        match error.kind() {
            ErrorKind::Processing if attempt <= self.max_retries => RetryDecision::Retry,
            ErrorKind::Processing => RetryDecision::Fail,
            ErrorKind::GpuMemory => RetryDecision::ReleaseAndFail,
            ErrorKind::ModelNotFound
            | ErrorKind::ModelLoad
            | ErrorKind::GpuNotFound
            | ErrorKind::InvalidInput
            | ErrorKind::Unexpected => RetryDecision::Fail,
        }
    }
}
