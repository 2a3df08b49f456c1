//! Engine configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use aria_core::{AriaError, AriaResult, RenderConfig, DEFAULT_SAMPLE_RATE, GIB};
use aria_visual::{DEFAULT_ORBIT_RADIUS, DEFAULT_ORBIT_RATE};

/// Default location of the pretrained scene checkpoint
pub const DEFAULT_MODEL_PATH: &str = "models/3d_gs/pretrained_model.safetensors";

/// Rendering service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Checkpoint with the splat scene (and, unless overridden, both networks)
    pub model_path: PathBuf,
    /// Optional YAML file overlaid on top of these values
    pub config_path: Option<PathBuf>,
    /// Separate checkpoint for the expression network
    pub expression_model_path: Option<PathBuf>,
    /// Separate checkpoint for the deformation head
    pub deformation_model_path: Option<PathBuf>,
    /// Sample rate of incoming PCM audio
    pub sample_rate: u32,
    /// Minimum accelerator memory, in GiB
    pub min_gpu_memory_gb: f64,
    /// Share of accelerator memory the scene may occupy
    pub memory_safety_fraction: f64,
    /// Retries for a frame that fails with a processing error
    pub max_frame_retries: u32,
    /// Camera orbit radius in world units
    pub orbit_radius: f32,
    /// Camera orbit rate in radians per second
    pub orbit_rate: f32,
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            config_path: None,
            expression_model_path: None,
            deformation_model_path: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            min_gpu_memory_gb: 6.0,
            memory_safety_fraction: 0.9,
            max_frame_retries: 2,
            orbit_radius: DEFAULT_ORBIT_RADIUS,
            orbit_rate: DEFAULT_ORBIT_RATE,
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_model_path(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(text: &str) -> AriaResult<Self> {
        serde_yaml::from_str(text).map_err(|e| AriaError::InvalidConfig(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> AriaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AriaError::model_not_found(path));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| AriaError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Apply the `config_path` overlay, if any, and validate.
    ///
    /// Only keys present in the file replace values on `self`; nested tables
    /// such as `render` merge key by key. Paths set on `self` win over paths
    /// in the file, except a `model_path` still at [`DEFAULT_MODEL_PATH`].
    pub fn resolve(self) -> AriaResult<Self> {
        let Some(path) = self.config_path.clone() else {
            self.validate()?;
            return Ok(self);
        };

        let overlay = Self::read_yaml_value(&path)?;
        let mut merged = serde_yaml::to_value(&self).map_err(|e| AriaError::InvalidConfig(e.to_string()))?;
        merge_yaml(&mut merged, overlay);
        let mut resolved: EngineConfig =
            serde_yaml::from_value(merged).map_err(|e| AriaError::InvalidConfig(format!("{}: {e}", path.display())))?;

        if self.model_path != Path::new(DEFAULT_MODEL_PATH) {
            resolved.model_path = self.model_path;
        }
        if self.expression_model_path.is_some() {
            resolved.expression_model_path = self.expression_model_path;
        }
        if self.deformation_model_path.is_some() {
            resolved.deformation_model_path = self.deformation_model_path;
        }
        resolved.config_path = Some(path);

        resolved.validate()?;
        Ok(resolved)
    }

    fn read_yaml_value(path: &Path) -> AriaResult<serde_yaml::Value> {
        if !path.exists() {
            return Err(AriaError::model_not_found(path));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| AriaError::InvalidConfig(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&text).map_err(|e| AriaError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> AriaResult<()> {
        self.render.validate()?;
        if self.sample_rate == 0 {
            return Err(AriaError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if !(self.memory_safety_fraction > 0.0 && self.memory_safety_fraction <= 1.0) {
            return Err(AriaError::InvalidConfig(format!(
                "memory_safety_fraction must be in (0, 1], got {}",
                self.memory_safety_fraction
            )));
        }
        if !(self.min_gpu_memory_gb.is_finite() && self.min_gpu_memory_gb >= 0.0) {
            return Err(AriaError::InvalidConfig(format!(
                "min_gpu_memory_gb must be >= 0, got {}",
                self.min_gpu_memory_gb
            )));
        }
        if !(self.orbit_radius.is_finite() && self.orbit_radius > 0.0 && self.orbit_rate.is_finite()) {
            return Err(AriaError::InvalidConfig(format!(
                "invalid orbit: radius={} rate={}",
                self.orbit_radius, self.orbit_rate
            )));
        }
        Ok(())
    }

    pub fn min_gpu_memory_bytes(&self) -> u64 {
        (self.min_gpu_memory_gb * GIB as f64) as u64
    }

    pub fn expression_path(&self) -> &Path {
        self.expression_model_path.as_deref().unwrap_or(self.model_path.as_path())
    }

    pub fn deformation_path(&self) -> &Path {
        self.deformation_model_path.as_deref().unwrap_or(self.model_path.as_path())
    }
}

/// Recursively overlay `overlay` onto `base`; mappings merge, anything else replaces
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        // an empty document leaves everything as is
        (_, serde_yaml::Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}
