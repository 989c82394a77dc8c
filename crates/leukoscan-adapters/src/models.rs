//! Model downloading and caching adapter.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Placeholder checksum indicating verification should be skipped.
const PLACEHOLDER_CHECKSUM: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const CHUNK_SIZE: usize = 64 * 1024;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Expected SHA256 hash. All zeros skips verification.
    pub sha256: &'static str,
    /// Filename in models directory, also appended to the download base URL.
    pub filename: &'static str,
}

/// Known models.
pub const MODELS: &[ModelInfo] = &[ModelInfo {
    name: "leukocoria",
    sha256: PLACEHOLDER_CHECKSUM,
    filename: "leukocoria.safetensors",
}];

/// Download progress: `(model name, bytes so far, total bytes if known)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

static MODELS_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Overrides the models directory for this process (`None` restores the default).
pub fn set_models_dir(dir: Option<PathBuf>) {
    *MODELS_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = dir;
}

/// Returns the models directory path.
///
/// Uses the override if set, else `XDG_DATA_HOME/leukoscan/models` or
/// `~/.local/share/leukoscan/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return dir;
    }
    default_models_dir()
}

fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leukoscan")
        .join("models")
}

/// Ensures all known models are present, downloading missing ones from `base_url`.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models_with_progress(
    base_url: &str,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir).context("Failed to create models directory")?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            let url = format!("{}/{}", base_url.trim_end_matches('/'), model.filename);
            download_model(model, &url, &path, progress)?;
        }
    }

    Ok(())
}

/// Downloads a model, verifies it and moves it into place.
fn download_model(
    model: &ModelInfo,
    url: &str,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model {} from {url}", model.name);

    let mut response =
        reqwest::blocking::get(url).with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    let mut bytes = Vec::with_capacity(total.map_or(0, |t| usize::try_from(t).unwrap_or(0)));
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = response
            .read(&mut chunk)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(model.name, bytes.len() as u64, total);
        }
    }

    verify_checksum(model, &bytes, path)?;

    // Write to a sibling first so an interrupted download never looks installed.
    let partial = path.with_extension("partial");
    fs::write(&partial, &bytes).with_context(|| format!("Failed to write {}", model.name))?;
    fs::rename(&partial, path).with_context(|| format!("Failed to install {}", model.name))?;

    info!("Downloaded {} ({} bytes)", model.name, bytes.len());
    Ok(())
}

fn verify_checksum(model: &ModelInfo, bytes: &[u8], path: &Path) -> Result<()> {
    if model.sha256 == PLACEHOLDER_CHECKSUM {
        debug!(
            "Skipping checksum verification for {} (placeholder checksum)",
            model.name
        );
        return Ok(());
    }

    let hash = format!("{:x}", Sha256::digest(bytes));
    if hash != model.sha256 {
        anyhow::bail!(
            "Checksum mismatch for {}: expected {}, got {}. \
             Try deleting {} and re-running to download a fresh copy.",
            model.name,
            model.sha256,
            hash,
            path.display()
        );
    }
    Ok(())
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| models_dir().join(m.filename))
}

/// Lists known models with their install status.
#[must_use]
pub fn list_models() -> Vec<(String, bool)> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().ends_with("leukoscan/models"));
    }

    #[test]
    fn test_model_path_unknown() {
        assert!(model_path("unknown").is_none());
    }

    #[test]
    fn test_checksum_mismatch() {
        let model = ModelInfo {
            name: "test",
            sha256: "1111111111111111111111111111111111111111111111111111111111111111",
            filename: "test.safetensors",
        };
        let err = verify_checksum(&model, b"abc", Path::new("/tmp/test.safetensors"));
        assert!(err.is_err());
    }

    #[test]
    fn test_checksum_match() {
        let model = ModelInfo {
            name: "test",
            sha256: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            filename: "test.safetensors",
        };
        assert!(verify_checksum(&model, b"abc", Path::new("/tmp/test.safetensors")).is_ok());
    }

    #[test]
    fn test_placeholder_skips_verification() {
        assert!(verify_checksum(&MODELS[0], b"anything", Path::new("/tmp/x")).is_ok());
    }
}
