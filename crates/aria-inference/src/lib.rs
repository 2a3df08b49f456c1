//! ARIA Inference - feature frames to expressions to offsets
//!
//! Two small learned functions sit between the audio front and the renderer:
//! - [`ExpressionModel`]: feature frame -> 52 blendshape weights in [-1, 1]
//! - [`DeformationModel`]: expression vector -> spatial [`Offset`](aria_core::Offset)
//!
//! Both are hand-written forward passes over weights read from safetensors
//! checkpoints. Inference is deterministic; there is no sampling.

pub mod blendshape;
pub mod deformation;
pub mod expression;
pub mod layers;

pub use blendshape::*;
pub use deformation::*;
pub use expression::*;
pub use layers::*;
