//! In-process inference with Candle.
//!
//! Provides the local leukocoria classifier together with the lazy model
//! handle and device selection it relies on.

mod device;
mod leukocoria_net;
mod loader;
mod utils;

pub use device::select_device;
pub use leukocoria_net::{LeukocoriaNet, LocalClassifier};
pub use loader::{load_safetensors, LazyModel};
pub use utils::sigmoid;
