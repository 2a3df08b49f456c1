//! PCM16 mono audio buffers

use aria_core::{AriaError, AriaResult};

/// Ordered 16-bit signed PCM samples at a fixed sample rate (mono)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> AriaResult<Self> {
        if sample_rate == 0 {
            return Err(AriaError::InvalidAudio("sample rate must be > 0".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// `len` zero samples
    pub fn silence(len: usize, sample_rate: u32) -> AriaResult<Self> {
        Self::new(vec![0; len], sample_rate)
    }

    /// Decode headerless little-endian PCM16.
    ///
    /// The byte length must be a multiple of two.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32) -> AriaResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(AriaError::InvalidAudio(format!(
                "PCM16 byte length must be even, got {}",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Encode back to little-endian PCM16 bytes
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples scaled to [-1.0, 1.0)
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }

    /// Samples peak-normalized so the loudest one reaches magnitude 1.0
    pub fn normalized(&self) -> Vec<f32> {
        let mut out = self.to_f32();
        if out.is_empty() {
            return out;
        }
        let peak = out.iter().fold(0.0f32, |m, v| m.max(v.abs())).max(1e-6);
        for v in &mut out {
            *v /= peak;
        }
        out
    }

    /// Linearly resample to `target_rate`
    pub fn resample(&self, target_rate: u32) -> AriaResult<AudioBuffer> {
        if target_rate == 0 {
            return Err(AriaError::InvalidAudio("target rate must be > 0".into()));
        }
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return AudioBuffer::new(self.samples.clone(), target_rate);
        }

        let src_hz = self.sample_rate as u64;
        let dst_hz = target_rate as u64;
        let new_len = (self.samples.len() as u64 * dst_hz / src_hz) as usize;

        let samples = (0..new_len)
            .map(|i| {
                let src_pos = i as f64 * src_hz as f64 / dst_hz as f64;
                let idx = src_pos.floor() as usize;
                let frac = src_pos - idx as f64;

                let a = self.samples.get(idx).copied().unwrap_or(0) as f64;
                let b = self.samples.get(idx + 1).copied().map_or(a, f64::from);
                (a * (1.0 - frac) + b * frac).round() as i16
            })
            .collect();

        AudioBuffer::new(samples, target_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80];
        let audio = AudioBuffer::from_pcm16_le(&bytes, 16_000).unwrap();
        assert_eq!(audio.samples(), &[1, -1, i16::MIN]);
        assert_eq!(audio.to_pcm16_le(), bytes.to_vec());
    }

    #[test]
    fn test_odd_length_rejected() {
        let err = AudioBuffer::from_pcm16_le(&[0, 0, 0], 16_000).unwrap_err();
        assert_eq!(err.kind(), aria_core::ErrorKind::InvalidInput);
        assert!(AudioBuffer::new(vec![], 0).is_err());
    }

    #[test]
    fn test_duration() {
        let audio = AudioBuffer::silence(16_000, 16_000).unwrap();
        assert!((audio.duration_secs() - 1.0).abs() < 1e-12);
        assert_eq!(audio.len(), 16_000);
    }

    #[test]
    fn test_normalized() {
        let audio = AudioBuffer::new(vec![0, 8192, -16384], 16_000).unwrap();
        let n = audio.normalized();
        assert!((n[1] - 0.5).abs() < 1e-6);
        assert!((n[2] + 1.0).abs() < 1e-6);

        let silent = AudioBuffer::silence(4, 16_000).unwrap();
        assert!(silent.normalized().iter().all(|v| *v == 0.0));
        assert!(AudioBuffer::new(vec![], 8_000).unwrap().normalized().is_empty());
    }

    #[test]
    fn test_resample_length_and_identity() {
        let audio = AudioBuffer::new((0..480).map(|i| i as i16).collect(), 48_000).unwrap();
        let down = audio.resample(16_000).unwrap();
        assert_eq!(down.sample_rate(), 16_000);
        assert_eq!(down.len(), 160);
        assert_eq!(down.samples()[1], 3);

        let same = audio.resample(48_000).unwrap();
        assert_eq!(same, audio);
    }
}
