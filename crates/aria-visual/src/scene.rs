//! Splat scene - Gaussians loaded once, deformed per frame

use std::path::Path;

use tracing::info;

use aria_core::{AriaError, AriaResult, Color, Offset, Vec3, WeightStore};

/// Checkpoint tensor holding `[N, 3]` positions
pub const POSITIONS_TENSOR: &str = "gaussians";
/// Checkpoint tensor holding `[N, 3]` colors
pub const COLORS_TENSOR: &str = "colors";
/// Checkpoint tensor holding `[N]` or `[N, 1]` opacities
pub const OPACITIES_TENSOR: &str = "opacities";

const POSITION_BYTES: u64 = 3 * 4;
const COLOR_BYTES: u64 = 3 * 4;
const OPACITY_BYTES: u64 = 4;

/// Immutable set of Gaussians: three index-aligned sequences of length N
#[derive(Debug, Clone)]
pub struct SplatScene {
    positions: Vec<Vec3>,
    colors: Vec<Color>,
    opacities: Vec<f32>,
}

impl SplatScene {
    /// Load from a safetensors checkpoint
    pub fn load(path: impl AsRef<Path>) -> AriaResult<Self> {
        let store = WeightStore::open(path)?;
        Self::from_store(&store)
    }

    pub fn from_store(store: &WeightStore) -> AriaResult<Self> {
        let positions = store.tensor_f32(POSITIONS_TENSOR)?;
        let n = match positions.shape.as_slice() {
            [n, 3] => *n,
            other => {
                return Err(AriaError::ModelLoad(format!(
                    "{POSITIONS_TENSOR} has shape {other:?}, expected [N, 3]"
                )));
            }
        };

        let colors = store.tensor_f32_shaped(COLORS_TENSOR, &[n, 3])?;
        let opacities = store.tensor_f32(OPACITIES_TENSOR)?;
        if !(opacities.shape == [n] || opacities.shape == [n, 1]) {
            return Err(AriaError::ModelLoad(format!(
                "{OPACITIES_TENSOR} has shape {:?}, expected [{n}] or [{n}, 1]",
                opacities.shape
            )));
        }

        let scene = Self::from_parts(
            positions.data.chunks_exact(3).map(Vec3::from_slice).collect(),
            colors.data.chunks_exact(3).map(Color::from_slice).collect(),
            opacities.data,
        )?;

        info!(
            path = %store.path().display(),
            gaussians = scene.len(),
            footprint_bytes = scene.footprint_bytes(),
            "Loaded splat scene"
        );
        Ok(scene)
    }

    /// Build from parallel sequences. Opacities are clamped into [0, 1].
    pub fn from_parts(positions: Vec<Vec3>, colors: Vec<Color>, mut opacities: Vec<f32>) -> AriaResult<Self> {
        if positions.len() != colors.len() || positions.len() != opacities.len() {
            return Err(AriaError::ModelLoad(format!(
                "scene sequences are misaligned: {} positions, {} colors, {} opacities",
                positions.len(),
                colors.len(),
                opacities.len()
            )));
        }
        if let Some(i) = positions.iter().position(|p| !p.is_finite()) {
            return Err(AriaError::ModelLoad(format!("non-finite position at gaussian {i}")));
        }
        if let Some(i) = colors.iter().position(|c| !c.is_finite()) {
            return Err(AriaError::ModelLoad(format!("non-finite color at gaussian {i}")));
        }
        if let Some(i) = opacities.iter().position(|o| !o.is_finite()) {
            return Err(AriaError::ModelLoad(format!("non-finite opacity at gaussian {i}")));
        }

        for o in &mut opacities {
            *o = o.clamp(0.0, 1.0);
        }

        Ok(Self {
            positions,
            colors,
            opacities,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn opacities(&self) -> &[f32] {
        &self.opacities
    }

    /// Resident size of the three sequences in bytes
    pub fn footprint_bytes(&self) -> u64 {
        self.len() as u64 * (POSITION_BYTES + COLOR_BYTES + OPACITY_BYTES)
    }

    /// Frame-local copy of the scene with `offset` added to every position
    pub fn apply_deformation(&self, offset: &Offset) -> AriaResult<DeformedScene<'_>> {
        self.apply_deformation_into(offset, Vec::with_capacity(self.len()))
    }

    /// Like [`apply_deformation`](Self::apply_deformation) but writes into a
    /// recycled position buffer (see [`DeformedScene::into_positions`])
    pub fn apply_deformation_into(&self, offset: &Offset, mut buffer: Vec<Vec3>) -> AriaResult<DeformedScene<'_>> {
        buffer.clear();
        match offset {
            Offset::Uniform(delta) => {
                buffer.extend(self.positions.iter().map(|p| *p + *delta));
            }
            Offset::PerPoint(field) => {
                if field.len() != self.len() {
                    return Err(AriaError::Processing(format!(
                        "offset field covers {} points, scene has {}",
                        field.len(),
                        self.len()
                    )));
                }
                buffer.extend(self.positions.iter().zip(field).map(|(p, d)| *p + *d));
            }
        }

        Ok(DeformedScene {
            positions: buffer,
            colors: &self.colors,
            opacities: &self.opacities,
        })
    }
}

/// Deformed view of a [`SplatScene`] for a single frame
#[derive(Debug)]
pub struct DeformedScene<'a> {
    positions: Vec<Vec3>,
    colors: &'a [Color],
    opacities: &'a [f32],
}

impl<'a> DeformedScene<'a> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &'a [Color] {
        self.colors
    }

    pub fn opacities(&self) -> &'a [f32] {
        self.opacities
    }

    /// Give the position buffer back for reuse on the next frame
    pub fn into_positions(self) -> Vec<Vec3> {
        self.positions
    }
}
