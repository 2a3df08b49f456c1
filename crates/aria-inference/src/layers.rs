//! Dense layer kernels

use aria_core::{AriaError, AriaResult, WeightStore};

/// Fully connected layer: `y = W x + b`, `W` stored `[out_dim, in_dim]`
#[derive(Debug, Clone)]
pub struct Linear {
    in_dim: usize,
    out_dim: usize,
    weight: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    pub fn new(in_dim: usize, out_dim: usize, weight: Vec<f32>, bias: Vec<f32>) -> AriaResult<Self> {
        if weight.len() != in_dim * out_dim || bias.len() != out_dim {
            return Err(AriaError::ModelLoad(format!(
                "linear layer {in_dim}->{out_dim} got weight len {} and bias len {}",
                weight.len(),
                bias.len()
            )));
        }
        if weight.iter().chain(&bias).any(|v| !v.is_finite()) {
            return Err(AriaError::ModelLoad(format!(
                "linear layer {in_dim}->{out_dim} has non-finite parameters"
            )));
        }
        Ok(Self {
            in_dim,
            out_dim,
            weight,
            bias,
        })
    }

    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self {
            in_dim,
            out_dim,
            weight: vec![0.0; in_dim * out_dim],
            bias: vec![0.0; out_dim],
        }
    }

    /// Load `{prefix}weight` / `{prefix}bias` with the expected shape
    pub fn load(store: &WeightStore, prefix: &str, in_dim: usize, out_dim: usize) -> AriaResult<Self> {
        let weight = store.tensor_f32_shaped(&format!("{prefix}weight"), &[out_dim, in_dim])?;
        let bias = store.tensor_f32_shaped(&format!("{prefix}bias"), &[out_dim])?;
        Self::new(in_dim, out_dim, weight.data, bias.data)
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub fn forward(&self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), self.in_dim);
        debug_assert_eq!(output.len(), self.out_dim);

        for (o, y) in output.iter_mut().enumerate() {
            let w = &self.weight[o * self.in_dim..(o + 1) * self.in_dim];
            let mut sum = self.bias[o];
            for (wi, xi) in w.iter().zip(input) {
                sum += wi * xi;
            }
            *y = sum;
        }
    }
}

#[inline]
pub fn relu_inplace(x: &mut [f32]) {
    for v in x {
        *v = v.max(0.0);
    }
}

#[inline]
pub fn tanh_inplace(x: &mut [f32]) {
    for v in x {
        *v = v.tanh();
    }
}
