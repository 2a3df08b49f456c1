//! ARIA Visual - splat scene, camera and rasterizer
//!
//! Per frame, the render loop drives this crate in a fixed order:
//!
//! ```text
//! SplatScene --apply_deformation(offset)--> DeformedScene
//! CameraTrajectory --pose_at(t)--> CameraPose
//! Rasterizer --render(deformed, pose)--> Frame (W x H x RGB24)
//! ```
//!
//! The loaded scene is never mutated. Deformation always produces a
//! frame-local copy of the positions, so offsets cannot accumulate
//! from one frame to the next.

pub mod camera;
pub mod frame;
pub mod raster;
pub mod scene;

pub use camera::*;
pub use frame::*;
pub use raster::*;
pub use scene::*;
