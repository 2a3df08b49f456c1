//! Safetensors-backed checkpoint access.
//!
//! Checkpoints are flat maps from tensor name to a row-major `f32` tensor.
//! Reading is memory-mapped; writing is used by tooling and test fixtures.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use safetensors::tensor::{Dtype, SafeTensorError, View};
use thiserror::Error;
use tracing::debug;

use crate::AriaError;

#[derive(Debug, Clone)]
pub struct TensorF32 {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorF32 {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] SafeTensorError),
    #[error("unsupported dtype for {name}: {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },
    #[error("invalid tensor byte length for {name}: got {bytes}, expected multiple of {elem_size}")]
    InvalidByteLen {
        name: String,
        bytes: usize,
        elem_size: usize,
    },
    #[error("tensor {name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        actual: Vec<usize>,
        expected: Vec<usize>,
    },
}

impl From<WeightError> for AriaError {
    fn from(err: WeightError) -> Self {
        AriaError::ModelLoad(err.to_string())
    }
}

/// Read-only view over a safetensors checkpoint
#[derive(Debug)]
pub struct WeightStore {
    path: PathBuf,
    mmap: memmap2::Mmap,
}

impl WeightStore {
    /// Map a checkpoint file.
    ///
    /// A missing file is `ModelNotFound`; an unreadable or malformed one is
    /// `ModelLoad`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AriaError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AriaError::model_not_found(path));
        }
        let store = Self::map(path)?;
        // Validate the header once up front.
        let tensors = safetensors::SafeTensors::deserialize(&store.mmap).map_err(WeightError::from)?;
        debug!(path = %path.display(), tensors = tensors.len(), bytes = store.mmap.len(), "Checkpoint mapped");
        Ok(store)
    }

    fn map(path: &Path) -> Result<Self, WeightError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: read-only file mapping for immutable tensor access.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> Result<Vec<String>, WeightError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        Ok(st.names().into_iter().cloned().collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        safetensors::SafeTensors::deserialize(&self.mmap)
            .map(|st| st.tensor(name).is_ok())
            .unwrap_or(false)
    }

    /// Does any tensor start with `prefix`?
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.names()
            .map(|names| names.iter().any(|n| n.starts_with(prefix)))
            .unwrap_or(false)
    }

    pub fn tensor_f32(&self, name: &str) -> Result<TensorF32, WeightError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        let tv = st.tensor(name)?;
        let dtype = tv.dtype();
        let shape = tv.shape().to_vec();
        let raw = tv.data();

        let data = match dtype {
            Dtype::F32 => {
                if raw.len() % 4 != 0 {
                    return Err(WeightError::InvalidByteLen {
                        name: name.to_string(),
                        bytes: raw.len(),
                        elem_size: 4,
                    });
                }
                raw.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            }
            Dtype::BF16 => {
                if raw.len() % 2 != 0 {
                    return Err(WeightError::InvalidByteLen {
                        name: name.to_string(),
                        bytes: raw.len(),
                        elem_size: 2,
                    });
                }
                raw.chunks_exact(2)
                    .map(|c| {
                        let bits = u16::from_le_bytes([c[0], c[1]]) as u32;
                        f32::from_bits(bits << 16)
                    })
                    .collect()
            }
            other => {
                return Err(WeightError::UnsupportedDtype {
                    name: name.to_string(),
                    dtype: other,
                });
            }
        };

        Ok(TensorF32 { shape, data })
    }

    /// Load a tensor and check its shape
    pub fn tensor_f32_shaped(&self, name: &str, expected: &[usize]) -> Result<TensorF32, WeightError> {
        let tensor = self.tensor_f32(name)?;
        if tensor.shape != expected {
            return Err(WeightError::ShapeMismatch {
                name: name.to_string(),
                actual: tensor.shape,
                expected: expected.to_vec(),
            });
        }
        Ok(tensor)
    }
}

#[derive(Debug, Clone)]
struct OwnedTensor {
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl View for OwnedTensor {
    fn dtype(&self) -> Dtype {
        Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Builds an `f32` safetensors checkpoint
#[derive(Debug, Default)]
pub struct CheckpointWriter {
    tensors: Vec<(String, OwnedTensor)>,
}

impl CheckpointWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tensor; `data.len()` must equal the product of `shape`
    pub fn tensor(mut self, name: &str, shape: &[usize], data: &[f32]) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        let mut bytes = Vec::with_capacity(data.len() * 4);
        for v in data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.tensors.push((
            name.to_string(),
            OwnedTensor {
                shape: shape.to_vec(),
                data: bytes,
            },
        ));
        self
    }

    pub fn write(self, path: impl AsRef<Path>) -> Result<(), WeightError> {
        safetensors::tensor::serialize_to_file(self.tensors, &None, path.as_ref())?;
        Ok(())
    }
}
