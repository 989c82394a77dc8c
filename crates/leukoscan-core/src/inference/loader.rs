//! Lazy model handle and safetensors loading.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use once_cell::sync::OnceCell;
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A model that is loaded on first access and then shared.
///
/// Concurrent first callers block on a single initialization. If loading
/// fails, nothing is cached and the next `get()` tries again.
pub struct LazyModel<T> {
    path: PathBuf,
    device: Device,
    builder: fn(VarBuilder) -> Result<T>,
    model: OnceCell<T>,
}

impl<T: Send + Sync> LazyModel<T> {
    /// Creates a handle; nothing is read until [`get`](Self::get).
    #[must_use]
    pub fn new(
        path: impl AsRef<Path>,
        device: Device,
        builder: fn(VarBuilder) -> Result<T>,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            device,
            builder,
            model: OnceCell::new(),
        }
    }

    /// Gets the model, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid
    /// safetensors, or does not fit the model.
    pub fn get(&self) -> Result<&T> {
        self.model.get_or_try_init(|| {
            let vb = load_safetensors(&self.path, &self.device)?;
            let model = (self.builder)(vb)
                .with_context(|| format!("Model weights do not fit: {}", self.path.display()))?;
            info!("Loaded model from {}", self.path.display());
            Ok(model)
        })
    }

    /// Returns true if the model has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Path the weights are read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads a safetensors file into a `VarBuilder` on `device`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds an unsupported dtype.
pub fn load_safetensors(path: impl AsRef<Path>, device: &Device) -> Result<VarBuilder<'static>> {
    let path = path.as_ref();
    debug!("Loading safetensors from {}", path.display());

    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;

    let tensors = SafeTensors::deserialize(&data)
        .with_context(|| format!("Failed to parse safetensors: {}", path.display()))?;

    let mut tensor_map: HashMap<String, Tensor> = HashMap::new();
    for (name, view) in tensors.tensors() {
        let dtype = to_candle_dtype(view.dtype())?;
        let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
            .with_context(|| format!("Failed to create tensor '{name}'"))?;
        tensor_map.insert(name, tensor);
    }
    debug!("Read {} tensor(s)", tensor_map.len());

    Ok(VarBuilder::from_tensors(tensor_map, DType::F32, device))
}

fn to_candle_dtype(dtype: safetensors::Dtype) -> Result<DType> {
    use safetensors::Dtype as S;
    match dtype {
        S::F32 => Ok(DType::F32),
        S::F64 => Ok(DType::F64),
        S::F16 => Ok(DType::F16),
        S::BF16 => Ok(DType::BF16),
        S::I64 => Ok(DType::I64),
        S::U8 => Ok(DType::U8),
        S::U32 => Ok(DType::U32),
        other => anyhow::bail!("Unsupported dtype: {other:?}"),
    }
}
