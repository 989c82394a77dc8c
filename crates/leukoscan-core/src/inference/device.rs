//! Device selection for the local classifier.

use candle_core::Device;
use tracing::{debug, info};

/// Picks the device the local classifier runs on.
///
/// GPU backends are tried only when compiled in (`metal`, `cuda` features);
/// a GPU that fails to initialize falls back to CPU.
#[must_use]
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Running leukocoria classifier on Metal");
                return device;
            }
            Err(e) => debug!("Metal unavailable: {e}"),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Running leukocoria classifier on CUDA");
                return device;
            }
            Err(e) => debug!("CUDA unavailable: {e}"),
        }
    }

    debug!("No GPU backend selected");
    info!("Running leukocoria classifier on CPU");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    fn test_cpu_without_gpu_features() {
        assert!(matches!(select_device(), Device::Cpu));
    }
}
