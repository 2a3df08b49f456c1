//! Render configuration
//!
//! Immutable for the lifetime of a rendering session.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AriaError, AriaResult, Color, BYTES_PER_PIXEL, DEFAULT_FRAME_RATE};

/// Output resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one RGB24 frame in bytes
    pub fn frame_bytes(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Render configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output resolution
    pub resolution: Resolution,
    /// Output frames per second
    pub frame_rate: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clipping plane
    pub near_plane: f32,
    /// Far clipping plane
    pub far_plane: f32,
    /// Color of pixels no splat covers
    pub background_color: Color,
    /// World-space standard deviation of one splat
    pub splat_scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            resolution: Resolution::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            fov_degrees: 45.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            background_color: Color::black(),
            splat_scale: 0.01,
        }
    }
}

impl RenderConfig {
    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }

    /// Parse from a YAML document
    pub fn from_yaml_str(text: &str) -> AriaResult<Self> {
        let config: RenderConfig = serde_yaml::from_str(text)
            .map_err(|e| AriaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> AriaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AriaError::model_not_found(path));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| AriaError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> AriaResult<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(AriaError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.resolution.width, self.resolution.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(AriaError::InvalidConfig("frame_rate must be > 0".into()));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(AriaError::InvalidConfig(format!(
                "fov must be in (0, 180) degrees, got {}",
                self.fov_degrees
            )));
        }
        if !(self.near_plane > 0.0 && self.near_plane < self.far_plane) {
            return Err(AriaError::InvalidConfig(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near_plane, self.far_plane
            )));
        }
        if !(self.splat_scale > 0.0) {
            return Err(AriaError::InvalidConfig("splat_scale must be > 0".into()));
        }
        Ok(())
    }
}
