//! Spectral building blocks: Hann window, DFT tables, Slaney mel filters.
//!
//! The DFT is evaluated directly against precomputed cos/sin tables; with a
//! 512-sample window this is cheap enough per hop and keeps results exact
//! and platform independent.

use std::f32::consts::PI;

const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = 15.0;
// ln(6.4) / 27
const LOGSTEP: f32 = 0.068_751_78;

#[inline]
pub fn hertz_to_mel(freq: f32) -> f32 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        3.0 * freq / 200.0
    }
}

#[inline]
pub fn mel_to_hertz(mels: f32) -> f32 {
    if mels >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mels - MIN_LOG_MEL)).exp()
    } else {
        200.0 * mels / 3.0
    }
}

/// Periodic Hann window: `0.5 * (1 - cos(2πi/N))`
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Precomputed real DFT basis for `n_fft` samples, `n_fft/2 + 1` bins
#[derive(Debug, Clone)]
pub struct DftTables {
    n_fft: usize,
    n_freq: usize,
    cos: Vec<f32>,
    sin: Vec<f32>,
}

impl DftTables {
    pub fn new(n_fft: usize) -> Self {
        let n_freq = n_fft / 2 + 1;
        let mut cos = vec![0.0f32; n_freq * n_fft];
        let mut sin = vec![0.0f32; n_freq * n_fft];

        for k in 0..n_freq {
            for n in 0..n_fft {
                // Reduce k*n modulo n_fft first to keep the angle small.
                let phase = (k * n) % n_fft;
                let angle = 2.0 * PI * phase as f32 / n_fft as f32;
                cos[k * n_fft + n] = angle.cos();
                sin[k * n_fft + n] = angle.sin();
            }
        }

        Self {
            n_fft,
            n_freq,
            cos,
            sin,
        }
    }

    pub fn n_freq(&self) -> usize {
        self.n_freq
    }

    /// Power spectrum `|X_k|^2` of one windowed frame
    pub fn power_spectrum(&self, frame: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.n_fft);
        debug_assert_eq!(out.len(), self.n_freq);

        for (k, bin) in out.iter_mut().enumerate() {
            let cos_row = &self.cos[k * self.n_fft..(k + 1) * self.n_fft];
            let sin_row = &self.sin[k * self.n_fft..(k + 1) * self.n_fft];
            let mut re = 0.0f32;
            let mut im = 0.0f32;
            for ((&x, &c), &s) in frame.iter().zip(cos_row).zip(sin_row) {
                re += x * c;
                im -= x * s;
            }
            *bin = re * re + im * im;
        }
    }
}

/// Slaney-normalized triangular mel filter bank, `[n_mels, n_freq]` row-major
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    n_mels: usize,
    n_freq: usize,
    filters: Vec<f32>,
}

impl MelFilterBank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let n_freq = n_fft / 2 + 1;
        let fft_freqs: Vec<f32> = (0..n_freq)
            .map(|f| f as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mel_min = hertz_to_mel(0.0);
        let mel_max = hertz_to_mel(sample_rate as f32 / 2.0);
        let filter_freqs: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hertz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let filter_diff: Vec<f32> = filter_freqs
            .windows(2)
            .map(|w| {
                let d = w[1] - w[0];
                if d == 0.0 {
                    1e-6
                } else {
                    d
                }
            })
            .collect();

        let mut filters = vec![0.0f32; n_mels * n_freq];
        for m in 0..n_mels {
            let enorm = 2.0 / (filter_freqs[m + 2] - filter_freqs[m]);
            for (f, &freq) in fft_freqs.iter().enumerate() {
                let down = (freq - filter_freqs[m]) / filter_diff[m];
                let up = (filter_freqs[m + 2] - freq) / filter_diff[m + 1];
                filters[m * n_freq + f] = down.min(up).max(0.0) * enorm;
            }
        }

        Self {
            n_mels,
            n_freq,
            filters,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// Project a power spectrum onto the mel bins
    pub fn apply(&self, power: &[f32], out: &mut [f32]) {
        debug_assert_eq!(power.len(), self.n_freq);
        debug_assert_eq!(out.len(), self.n_mels);

        for (m, mel) in out.iter_mut().enumerate() {
            let row = &self.filters[m * self.n_freq..(m + 1) * self.n_freq];
            *mel = row.iter().zip(power).map(|(w, p)| w * p).sum();
        }
    }
}
