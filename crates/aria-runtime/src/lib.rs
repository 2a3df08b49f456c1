//! ARIA Runtime - rendering service and render loop
//!
//! This crate turns audio into a paced stream of avatar frames:
//! 1. Preflight the accelerator and admit the scene ([`ResourceGuard`])
//! 2. Extract features and infer expressions for the whole clip
//! 3. Per frame: deform, pose the camera, rasterize (with [`RetryPolicy`])
//! 4. Hold each frame until its deadline, then emit it ([`FrameStream`])
//!
//! It also carries the ambient pieces around the loop: configuration,
//! statistics, tracing setup and the conversation collaborators that feed
//! synthesized speech into the renderer.

pub mod collaborators;
pub mod config;
pub mod guard;
pub mod retry;
pub mod service;
pub mod stats;
pub mod telemetry;

pub use collaborators::*;
pub use config::*;
pub use guard::*;
pub use retry::*;
pub use service::*;
pub use stats::*;
pub use telemetry::*;
