//! Expression inference - feature frames to blendshape weights

use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use aria_audio::FeatureFrame;
use aria_core::{AriaError, AriaResult, WeightStore, EXPRESSION_DIM, FEATURE_DIM, HIDDEN_DIM};

use crate::blendshape::{blendshape_index, region_of, FacialRegion, BLENDSHAPE_NAMES};
use crate::layers::{relu_inplace, tanh_inplace, Linear};

/// Tensor-name prefix of the expression network inside a checkpoint
pub const EXPRESSION_PREFIX: &str = "expression_net.";

/// Expression parameters for one frame, each component in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionVector([f32; EXPRESSION_DIM]);

impl Default for ExpressionVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl ExpressionVector {
    /// All blendshapes at rest
    pub fn neutral() -> Self {
        ExpressionVector([0.0; EXPRESSION_DIM])
    }

    /// Build from raw values, clamping into [-1, 1] (NaN becomes 0)
    pub fn from_values(values: [f32; EXPRESSION_DIM]) -> Self {
        let mut out = values;
        for v in &mut out {
            *v = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        }
        ExpressionVector(out)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    /// Weight of a named blendshape
    pub fn blendshape(&self, name: &str) -> Option<f32> {
        blendshape_index(name).map(|i| self.0[i])
    }

    /// `(name, weight)` pairs in output order
    pub fn blendshapes(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        BLENDSHAPE_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    /// Mean absolute activation of one facial region
    pub fn region_energy(&self, region: FacialRegion) -> f32 {
        let (sum, count) = self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| region_of(*i) == Some(region))
            .fold((0.0f32, 0usize), |(s, c), (_, v)| (s + v.abs(), c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

/// Feed-forward expression network
///
/// `Linear(128, 256) -> ReLU -> Linear(256, 256) -> ReLU -> Linear(256, 52) -> Tanh`
#[derive(Debug, Clone)]
pub struct ExpressionModel {
    input: Linear,
    hidden: Linear,
    output: Linear,
}

impl ExpressionModel {
    /// Load from a safetensors checkpoint using the default tensor prefix
    pub fn load(path: impl AsRef<Path>) -> AriaResult<Self> {
        let store = WeightStore::open(path)?;
        Self::from_store(&store, EXPRESSION_PREFIX)
    }

    /// Load `{prefix}network.{0,2,4}.{weight,bias}`
    pub fn from_store(store: &WeightStore, prefix: &str) -> AriaResult<Self> {
        let input = Linear::load(store, &format!("{prefix}network.0."), FEATURE_DIM, HIDDEN_DIM)?;
        let hidden = Linear::load(store, &format!("{prefix}network.2."), HIDDEN_DIM, HIDDEN_DIM)?;
        let output = Linear::load(store, &format!("{prefix}network.4."), HIDDEN_DIM, EXPRESSION_DIM)?;

        info!(
            path = %store.path().display(),
            prefix,
            "Loaded expression model"
        );
        Ok(Self { input, hidden, output })
    }

    pub fn from_layers(input: Linear, hidden: Linear, output: Linear) -> AriaResult<Self> {
        let dims = [
            (input.in_dim(), input.out_dim()),
            (hidden.in_dim(), hidden.out_dim()),
            (output.in_dim(), output.out_dim()),
        ];
        let expected = [
            (FEATURE_DIM, HIDDEN_DIM),
            (HIDDEN_DIM, HIDDEN_DIM),
            (HIDDEN_DIM, EXPRESSION_DIM),
        ];
        if dims != expected {
            return Err(AriaError::ModelLoad(format!(
                "expression layers {dims:?} do not match {expected:?}"
            )));
        }
        Ok(Self { input, hidden, output })
    }

    /// Single-frame forward pass
    pub fn infer(&self, features: &FeatureFrame) -> AriaResult<ExpressionVector> {
        if features.dim() != FEATURE_DIM {
            return Err(AriaError::Processing(format!(
                "feature frame has {} values, expected {FEATURE_DIM}",
                features.dim()
            )));
        }

        let mut h1 = [0.0f32; HIDDEN_DIM];
        let mut h2 = [0.0f32; HIDDEN_DIM];
        let mut out = [0.0f32; EXPRESSION_DIM];

        self.input.forward(features.as_slice(), &mut h1);
        relu_inplace(&mut h1);
        self.hidden.forward(&h1, &mut h2);
        relu_inplace(&mut h2);
        self.output.forward(&h2, &mut out);
        tanh_inplace(&mut out);

        Ok(ExpressionVector::from_values(out))
    }

    /// Forward pass over a sequence, output index-aligned with the input
    pub fn infer_batch(&self, features: &[FeatureFrame]) -> AriaResult<Vec<ExpressionVector>> {
        features.par_iter().map(|f| self.infer(f)).collect()
    }
}
