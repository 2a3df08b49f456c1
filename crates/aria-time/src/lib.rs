//! ARIA Time - media clock and frame pacing
//!
//! - [`MediaClock`]: exact integer mapping between audio samples, frame
//!   indices and media time
//! - [`FramePacer`]: wall-clock deadlines for frame emission, never early,
//!   never skipping

pub mod clock;
pub mod pacer;

pub use clock::*;
pub use pacer::*;
