//! Feature extraction - audio samples to per-hop log-mel frames

use rayon::prelude::*;
use tracing::debug;

use aria_core::{AriaError, AriaResult, DEFAULT_SAMPLE_RATE, FEATURE_DIM, HOP_LENGTH, WINDOW_SIZE};

use crate::mel::{hann_window, DftTables, MelFilterBank};
use crate::AudioBuffer;

/// Power floor before the log
const POWER_FLOOR: f32 = 1e-10;

/// Feature extractor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    /// Analysis window width in samples
    pub window_size: usize,
    /// Stride between windows in samples
    pub hop_length: usize,
    /// Output dimension (mel bins)
    pub feature_dim: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: WINDOW_SIZE,
            hop_length: HOP_LENGTH,
            feature_dim: FEATURE_DIM,
        }
    }
}

impl FeatureConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        FeatureConfig {
            sample_rate,
            ..Default::default()
        }
    }

    /// Number of frames produced for `num_samples` input samples
    pub fn frame_count(&self, num_samples: usize) -> usize {
        num_samples / self.hop_length
    }
}

/// One fixed-length feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame(Vec<f32>);

impl FeatureFrame {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }
}

/// Turns raw audio into one [`FeatureFrame`] per hop.
///
/// Windows of `window_size` samples start every `hop_length` samples. A
/// window running past the end of the buffer is zero padded; a trailing
/// remainder shorter than one hop produces no frame.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    window: Vec<f32>,
    dft: DftTables,
    mel: MelFilterBank,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> AriaResult<Self> {
        if config.sample_rate == 0 || config.window_size == 0 || config.hop_length == 0 {
            return Err(AriaError::InvalidConfig(format!(
                "feature extractor needs non-zero rate/window/hop, got {config:?}"
            )));
        }
        if config.feature_dim == 0 {
            return Err(AriaError::InvalidConfig("feature_dim must be > 0".into()));
        }
        Ok(Self {
            window: hann_window(config.window_size),
            dft: DftTables::new(config.window_size),
            mel: MelFilterBank::new(config.sample_rate, config.window_size, config.feature_dim),
            config,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the feature sequence for `audio`.
    ///
    /// The caller is responsible for passing audio at the configured rate.
    pub fn extract(&self, audio: &AudioBuffer) -> Vec<FeatureFrame> {
        debug_assert_eq!(audio.sample_rate(), self.config.sample_rate);

        let samples = audio.to_f32();
        let n_frames = self.config.frame_count(samples.len());

        let frames: Vec<FeatureFrame> = (0..n_frames)
            .into_par_iter()
            .map(|k| self.frame_at(&samples, k * self.config.hop_length))
            .collect();
        debug!(samples = samples.len(), frames = frames.len(), "Extracted features");
        frames
    }

    fn frame_at(&self, samples: &[f32], start: usize) -> FeatureFrame {
        let size = self.config.window_size;
        let mut windowed = vec![0.0f32; size];
        let end = (start + size).min(samples.len());
        for (i, (dst, &src)) in windowed.iter_mut().zip(&samples[start..end]).enumerate() {
            *dst = src * self.window[i];
        }

        let mut power = vec![0.0f32; self.dft.n_freq()];
        self.dft.power_spectrum(&windowed, &mut power);

        let mut mel = vec![0.0f32; self.mel.n_mels()];
        self.mel.apply(&power, &mut mel);
        for v in &mut mel {
            *v = (v.max(POWER_FLOOR).log10() + 4.0) / 4.0;
        }

        FeatureFrame(mel)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        let config = FeatureConfig::default();
        Self {
            window: hann_window(config.window_size),
            dft: DftTables::new(config.window_size),
            mel: MelFilterBank::new(config.sample_rate, config.window_size, config.feature_dim),
            config,
        }
    }
}
