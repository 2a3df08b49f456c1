//! ARIA Bench - synthetic fixtures for the criterion suites
//!
//! Everything here is seeded so runs are comparable across machines.

use rand::{rngs::StdRng, Rng, SeedableRng};

use aria_audio::AudioBuffer;
use aria_core::{AriaResult, Color, Vec3, EXPRESSION_DIM, FEATURE_DIM, HIDDEN_DIM};
use aria_inference::{DeformationModel, ExpressionModel, Linear};
use aria_visual::SplatScene;

pub const SEED: u64 = 0xA21A;

/// Sine sweep with a slowly varying envelope
pub fn speech_like(seconds: f32, sample_rate: u32) -> AriaResult<AudioBuffer> {
    let len = (seconds * sample_rate as f32) as usize;
    let samples = (0..len)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            let envelope = 0.5 + 0.5 * (2.0 * std::f32::consts::PI * 3.0 * t).sin();
            let tone = (2.0 * std::f32::consts::PI * (180.0 + 60.0 * t) * t).sin();
            (envelope * tone * 12_000.0) as i16
        })
        .collect();
    AudioBuffer::new(samples, sample_rate)
}

/// Gaussians scattered inside a unit ball around the origin
pub fn random_scene(gaussians: usize) -> AriaResult<SplatScene> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut positions = Vec::with_capacity(gaussians);
    let mut colors = Vec::with_capacity(gaussians);
    let mut opacities = Vec::with_capacity(gaussians);
    for _ in 0..gaussians {
        positions.push(Vec3::new(
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
        ));
        colors.push(Color::new(rng.gen(), rng.gen(), rng.gen()));
        opacities.push(rng.gen_range(0.2..1.0));
    }
    SplatScene::from_parts(positions, colors, opacities)
}

fn random_linear(rng: &mut StdRng, in_dim: usize, out_dim: usize) -> AriaResult<Linear> {
    let scale = 1.0 / (in_dim as f32).sqrt();
    let weight = (0..in_dim * out_dim).map(|_| rng.gen_range(-scale..scale)).collect();
    let bias = (0..out_dim).map(|_| rng.gen_range(-0.1..0.1)).collect();
    Linear::new(in_dim, out_dim, weight, bias)
}

pub fn random_expression_model() -> AriaResult<ExpressionModel> {
    let mut rng = StdRng::seed_from_u64(SEED);
    ExpressionModel::from_layers(
        random_linear(&mut rng, FEATURE_DIM, HIDDEN_DIM)?,
        random_linear(&mut rng, HIDDEN_DIM, HIDDEN_DIM)?,
        random_linear(&mut rng, HIDDEN_DIM, EXPRESSION_DIM)?,
    )
}

/// Per-point deformation over `points` gaussians
pub fn random_deformation(points: usize) -> AriaResult<DeformationModel> {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    let weight = (0..3 * points * EXPRESSION_DIM).map(|_| rng.gen_range(-0.01..0.01)).collect();
    DeformationModel::new(weight, vec![0.0; 3 * points])
}
