//! Deformation - expression vectors to spatial offsets
//!
//! A single affine map `offset = W e + b` with `W` of shape `[3m, 52]`.
//! `m = 1` yields one offset shared by the whole scene, `m = N` yields an
//! offset per Gaussian. Callers only ever see [`Offset`].

use std::path::Path;

use rayon::prelude::*;
use tracing::{info, warn};

use aria_core::{AriaError, AriaResult, Offset, Vec3, WeightStore, EXPRESSION_DIM};

use crate::expression::ExpressionVector;

/// Tensor-name prefix of the deformation head inside a checkpoint
pub const DEFORMATION_PREFIX: &str = "deformation.";

/// Per-point fields below this size are evaluated serially
const PARALLEL_MIN_POINTS: usize = 4096;

#[derive(Debug, Clone)]
pub struct DeformationModel {
    /// `[3 * points, EXPRESSION_DIM]`, row-major
    weight: Vec<f32>,
    bias: Vec<f32>,
    points: usize,
}

impl DeformationModel {
    /// Zero offset for every expression
    pub fn neutral() -> Self {
        Self {
            weight: vec![0.0; 3 * EXPRESSION_DIM],
            bias: vec![0.0; 3],
            points: 1,
        }
    }

    pub fn new(weight: Vec<f32>, bias: Vec<f32>) -> AriaResult<Self> {
        let rows = bias.len();
        if rows == 0 || rows % 3 != 0 {
            return Err(AriaError::ModelLoad(format!(
                "deformation bias length {rows} is not a positive multiple of 3"
            )));
        }
        if weight.len() != rows * EXPRESSION_DIM {
            return Err(AriaError::ModelLoad(format!(
                "deformation weight has {} values, expected {rows}x{EXPRESSION_DIM}",
                weight.len()
            )));
        }
        if weight.iter().chain(&bias).any(|v| !v.is_finite()) {
            return Err(AriaError::ModelLoad("deformation parameters are not finite".into()));
        }
        Ok(Self {
            weight,
            bias,
            points: rows / 3,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> AriaResult<Self> {
        let store = WeightStore::open(path)?;
        Self::from_store(&store, DEFORMATION_PREFIX)
    }

    pub fn from_store(store: &WeightStore, prefix: &str) -> AriaResult<Self> {
        let weight = store.tensor_f32(&format!("{prefix}weight"))?;
        let bias = store.tensor_f32(&format!("{prefix}bias"))?;

        match weight.shape.as_slice() {
            [rows, cols] if *cols == EXPRESSION_DIM && bias.shape == [*rows] => {}
            _ => {
                return Err(AriaError::ModelLoad(format!(
                    "deformation tensors have shapes {:?} / {:?}, expected [3m, {EXPRESSION_DIM}] / [3m]",
                    weight.shape, bias.shape
                )));
            }
        }

        let model = Self::new(weight.data, bias.data)?;
        info!(points = model.points, prefix, "Loaded deformation model");
        Ok(model)
    }

    /// Load the deformation head if the checkpoint carries one, otherwise
    /// fall back to the neutral model
    pub fn from_store_or_neutral(store: &WeightStore, prefix: &str) -> AriaResult<Self> {
        if store.has_prefix(prefix) {
            Self::from_store(store, prefix)
        } else {
            warn!(
                path = %store.path().display(),
                prefix,
                "Checkpoint has no deformation tensors, using zero offset"
            );
            Ok(Self::neutral())
        }
    }

    /// Number of points the offset field covers (1 for a uniform offset)
    pub fn point_count(&self) -> usize {
        self.points
    }

    pub fn is_uniform(&self) -> bool {
        self.points == 1
    }

    pub fn deform(&self, expr: &ExpressionVector) -> Offset {
        let e = expr.as_slice();
        if self.points == 1 {
            return Offset::Uniform(self.point_offset(0, e));
        }

        let field = if self.points >= PARALLEL_MIN_POINTS {
            (0..self.points)
                .into_par_iter()
                .map(|p| self.point_offset(p, e))
                .collect()
        } else {
            (0..self.points).map(|p| self.point_offset(p, e)).collect()
        };
        Offset::PerPoint(field)
    }

    #[inline]
    fn point_offset(&self, point: usize, e: &[f32]) -> Vec3 {
        let mut xyz = [0.0f32; 3];
        for (axis, out) in xyz.iter_mut().enumerate() {
            let row = 3 * point + axis;
            let w = &self.weight[row * EXPRESSION_DIM..(row + 1) * EXPRESSION_DIM];
            *out = self.bias[row] + w.iter().zip(e).map(|(a, b)| a * b).sum::<f32>();
        }
        Vec3::new(xyz[0], xyz[1], xyz[2])
    }
}

impl Default for DeformationModel {
    fn default() -> Self {
        Self::neutral()
    }
}
