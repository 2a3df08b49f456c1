//! ARIA Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every stage of the avatar
//! rendering pipeline:
//! - Error taxonomy (AriaError, ErrorKind)
//! - Geometry (Vec3, Mat3, Mat4) and colors
//! - Render configuration (RenderConfig, Resolution)
//! - Checkpoint access (WeightStore, CheckpointWriter)
//! - Accelerator memory accounting (Accelerator, MemoryPool)
//! - Pipeline constants

pub mod checkpoint;
pub mod color;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod math;

pub use checkpoint::*;
pub use color::*;
pub use config::*;
pub use constants::*;
pub use device::*;
pub use error::*;
pub use math::*;
