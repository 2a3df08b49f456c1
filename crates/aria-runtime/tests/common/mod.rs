//! Shared fixtures for the runtime integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use aria_audio::AudioBuffer;
use aria_core::{
    Accelerator, AriaError, AriaResult, CheckpointWriter, Color, Resolution, SimulatedAccelerator, Vec3,
    EXPRESSION_DIM, FEATURE_DIM, GIB, HIDDEN_DIM,
};
use aria_inference::{DeformationModel, ExpressionModel, Linear};
use aria_runtime::{EngineConfig, SessionComponents};
use aria_visual::{CameraPose, DeformedScene, Frame, Rasterizer, SplatRasterizer, SplatScene};

pub const GAUSSIANS: usize = 64;

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.render.resolution = Resolution::new(32, 24);
    config.render.splat_scale = 0.05;
    config
}

pub fn device() -> Arc<SimulatedAccelerator> {
    Arc::new(SimulatedAccelerator::new("sim-gpu", 8 * GIB))
}

/// Gaussians on a small grid around the origin
pub fn grid_scene() -> SplatScene {
    let mut positions = Vec::with_capacity(GAUSSIANS);
    let mut colors = Vec::with_capacity(GAUSSIANS);
    for i in 0..GAUSSIANS {
        let (x, y) = ((i % 8) as f32, (i / 8) as f32);
        positions.push(Vec3::new(x * 0.1 - 0.35, y * 0.1 - 0.35, 0.0));
        colors.push(Color::new(x / 8.0, y / 8.0, 0.5));
    }
    SplatScene::from_parts(positions, colors, vec![0.8; GAUSSIANS]).unwrap()
}

fn random_vec(rng: &mut StdRng, len: usize, scale: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
}

pub struct NetworkWeights {
    pub layers: [(Vec<f32>, Vec<f32>); 3],
    pub deformation: (Vec<f32>, Vec<f32>),
}

pub fn network_weights(seed: u64) -> NetworkWeights {
    let mut rng = StdRng::seed_from_u64(seed);
    NetworkWeights {
        layers: [
            (random_vec(&mut rng, HIDDEN_DIM * FEATURE_DIM, 0.3), random_vec(&mut rng, HIDDEN_DIM, 0.1)),
            (random_vec(&mut rng, HIDDEN_DIM * HIDDEN_DIM, 0.2), random_vec(&mut rng, HIDDEN_DIM, 0.1)),
            (random_vec(&mut rng, EXPRESSION_DIM * HIDDEN_DIM, 0.2), random_vec(&mut rng, EXPRESSION_DIM, 0.1)),
        ],
        deformation: (random_vec(&mut rng, 3 * EXPRESSION_DIM, 0.05), vec![0.0; 3]),
    }
}

pub fn components(seed: u64) -> SessionComponents {
    let w = network_weights(seed);
    let dims = [(FEATURE_DIM, HIDDEN_DIM), (HIDDEN_DIM, HIDDEN_DIM), (HIDDEN_DIM, EXPRESSION_DIM)];
    let [l0, l2, l4] = w.layers;
    let linear = |(weight, bias): (Vec<f32>, Vec<f32>), (i, o): (usize, usize)| Linear::new(i, o, weight, bias).unwrap();

    SessionComponents {
        scene: grid_scene(),
        expression: ExpressionModel::from_layers(linear(l0, dims[0]), linear(l2, dims[1]), linear(l4, dims[2])).unwrap(),
        deformation: DeformationModel::new(w.deformation.0, w.deformation.1).unwrap(),
    }
}

/// Write a checkpoint with the scene, and optionally the two networks
pub fn write_checkpoint(path: &Path, with_expression: bool, with_deformation: bool) {
    let scene = grid_scene();
    let positions: Vec<f32> = scene.positions().iter().flat_map(|p| p.to_array()).collect();
    let colors: Vec<f32> = scene.colors().iter().flat_map(|c| [c.r, c.g, c.b]).collect();

    let mut writer = CheckpointWriter::new()
        .tensor("gaussians", &[GAUSSIANS, 3], &positions)
        .tensor("colors", &[GAUSSIANS, 3], &colors)
        .tensor("opacities", &[GAUSSIANS], scene.opacities());

    let w = network_weights(11);
    if with_expression {
        let shapes = [[HIDDEN_DIM, FEATURE_DIM], [HIDDEN_DIM, HIDDEN_DIM], [EXPRESSION_DIM, HIDDEN_DIM]];
        for ((layer, (weight, bias)), shape) in [0, 2, 4].iter().zip(&w.layers).zip(shapes) {
            writer = writer
                .tensor(&format!("expression_net.network.{layer}.weight"), &shape, weight)
                .tensor(&format!("expression_net.network.{layer}.bias"), &[shape[0]], bias);
        }
    }
    if with_deformation {
        writer = writer
            .tensor("deformation.weight", &[3, EXPRESSION_DIM], &w.deformation.0)
            .tensor("deformation.bias", &[3], &w.deformation.1);
    }
    writer.write(path).unwrap();
}

/// Loud-quiet speech-like signal, loudness changing every hop
pub fn voiced_audio(samples: usize) -> AudioBuffer {
    let data = (0..samples)
        .map(|n| {
            let amp = ((n / 256) % 7 + 1) as f32 * 3000.0;
            let phase = 2.0 * std::f32::consts::PI * 220.0 * n as f32 / 16_000.0;
            (amp * phase.sin()) as i16
        })
        .collect();
    AudioBuffer::new(data, 16_000).unwrap()
}

pub fn silence(samples: usize) -> AudioBuffer {
    AudioBuffer::silence(samples, 16_000).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Pass,
    Processing,
    GpuMemory,
    Panic,
}

/// Rasterizer wrapper that injects faults and records what it was given
pub struct ScriptedRasterizer {
    inner: SplatRasterizer,
    script: Mutex<VecDeque<Fault>>,
    fallback: Fault,
    calls: AtomicU32,
    releases: AtomicU32,
    first_positions: Mutex<Vec<Vec3>>,
}

impl ScriptedRasterizer {
    pub fn new(config: &EngineConfig, device: Arc<dyn Accelerator>, script: Vec<Fault>) -> Arc<Self> {
        Self::with_fallback(config, device, script, Fault::Pass)
    }

    pub fn with_fallback(
        config: &EngineConfig,
        device: Arc<dyn Accelerator>,
        script: Vec<Fault>,
        fallback: Fault,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: SplatRasterizer::new(config.render.clone(), device).unwrap(),
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            releases: AtomicU32::new(0),
            first_positions: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Deformed position of gaussian 0, one entry per render call
    pub fn first_positions(&self) -> Vec<Vec3> {
        self.first_positions.lock().clone()
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn render(&self, scene: &DeformedScene<'_>, pose: &CameraPose, index: u64) -> AriaResult<Frame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(p) = scene.positions().first() {
            self.first_positions.lock().push(*p);
        }

        let fault = self.script.lock().pop_front().unwrap_or(self.fallback);
        match fault {
            Fault::Pass => self.inner.render(scene, pose, index),
            Fault::Processing => Err(AriaError::Processing(format!("injected failure at frame {index}"))),
            Fault::GpuMemory => Err(AriaError::GpuMemory {
                required: 1 << 30,
                available: 0,
            }),
            Fault::Panic => panic!("injected panic at frame {index}"),
        }
    }

    fn release_memory(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release_memory();
    }

    fn resolution(&self) -> Resolution {
        self.inner.resolution()
    }
}
