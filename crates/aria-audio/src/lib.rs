//! ARIA Audio - speech in, feature frames out
//!
//! This crate is the audio front of the avatar pipeline:
//! - PCM16 mono ingestion ([`AudioBuffer`])
//! - Peak normalization and linear resampling
//! - Windowed log-mel feature extraction ([`FeatureExtractor`])
//!
//! Audio arrives as headerless little-endian 16-bit samples. Everything
//! downstream consumes one [`FeatureFrame`] per hop.

pub mod features;
pub mod mel;
pub mod pcm;

pub use features::*;
pub use pcm::*;
