//! Pipeline constants

/// Default PCM sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Analysis window width in samples
pub const WINDOW_SIZE: usize = 512;

/// Stride between analysis windows in samples
pub const HOP_LENGTH: usize = 256;

/// Dimension of one feature frame (mel bins)
pub const FEATURE_DIM: usize = 128;

/// Hidden width of the expression network
pub const HIDDEN_DIM: usize = 256;

/// Dimension of one expression vector (ARKit blendshapes)
pub const EXPRESSION_DIM: usize = 52;

/// Default output frame rate
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Bytes per output pixel (RGB24)
pub const BYTES_PER_PIXEL: usize = 3;

pub const GIB: u64 = 1024 * 1024 * 1024;
