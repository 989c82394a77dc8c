//! Mock implementations of core port traits.

use std::sync::{Arc, Mutex, PoisonError};

use image::{DynamicImage, GenericImageView, RgbImage};
use leukoscan_core::domain::{DetectionBox, Outcome, PipelineResult};
use leukoscan_core::ports::{Detector, LeukocoriaClassifier, ResultStore, StoredRecord};

type DetectFn = dyn Fn(&DynamicImage) -> anyhow::Result<Vec<DetectionBox>> + Send + Sync;
type ClassifyFn = dyn Fn(&RgbImage) -> anyhow::Result<f32> + Send + Sync;

/// Mock implementation of `Detector` for testing.
///
/// Answers from a closure and records the size of every image it was shown.
pub struct MockDetector {
    name: String,
    respond: Box<DetectFn>,
    seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockDetector {
    /// Creates a detector that answers with `respond`.
    pub fn from_fn<F>(name: &str, respond: F) -> Self
    where
        F: Fn(&DynamicImage) -> anyhow::Result<Vec<DetectionBox>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            respond: Box::new(respond),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a detector that always returns `boxes`.
    #[must_use]
    pub fn returning(name: &str, boxes: Vec<DetectionBox>) -> Self {
        Self::from_fn(name, move |_| Ok(boxes.clone()))
    }

    /// Creates a detector that never finds anything.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self::returning(name, Vec::new())
    }

    /// Creates a detector whose every call fails with `message`.
    #[must_use]
    pub fn failing(name: &str, message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(name, move |_| Err(anyhow::anyhow!("{message}")))
    }

    /// Creates a detector that fails `failures` times, then returns `boxes`.
    #[must_use]
    pub fn flaky(name: &str, failures: usize, boxes: Vec<DetectionBox>) -> Self {
        let remaining = Mutex::new(failures);
        Self::from_fn(name, move |_| {
            let mut remaining = remaining.lock().unwrap_or_else(PoisonError::into_inner);
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("transient failure");
            }
            Ok(boxes.clone())
        })
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the dimensions of every image passed to `infer`, in call order.
    #[must_use]
    pub fn seen_dimensions(&self) -> Vec<(u32, u32)> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Detector for MockDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionBox>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image.dimensions());
        (self.respond)(image)
    }
}

/// Mock implementation of `LeukocoriaClassifier` for testing.
pub struct MockClassifier {
    respond: Box<ClassifyFn>,
    calls: Arc<Mutex<usize>>,
}

impl MockClassifier {
    /// Creates a classifier that answers with `respond`.
    pub fn from_fn(
        respond: impl Fn(&RgbImage) -> anyhow::Result<f32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a classifier that always returns `probability`.
    #[must_use]
    pub fn fixed(probability: f32) -> Self {
        Self::from_fn(move |_| Ok(probability))
    }

    /// Creates a classifier whose probability is the crop's mean brightness.
    ///
    /// Pairs with [`SyntheticImageBuilder::face_scene`](crate::SyntheticImageBuilder::face_scene)
    /// to give each eye its own score.
    #[must_use]
    pub fn by_brightness() -> Self {
        Self::from_fn(|crop| Ok(mean_brightness(crop)))
    }

    /// Creates a classifier whose every call fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_| Err(anyhow::anyhow!("{message}")))
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LeukocoriaClassifier for MockClassifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn classify(&self, crop: &RgbImage) -> anyhow::Result<f32> {
        if let Ok(mut c) = self.calls.lock() {
            *c += 1;
        }
        (self.respond)(crop)
    }
}

/// Mean of all channels, scaled to 0.0-1.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_brightness(image: &RgbImage) -> f32 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let sum: u64 = raw.iter().map(|&v| u64::from(v)).sum();
    sum as f32 / raw.len() as f32 / 255.0
}

/// One call captured by [`MockResultStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Name the upload was stored under.
    pub original_name: String,
    /// Size of the uploaded bytes.
    pub bytes: usize,
    /// Whether both eyes were analyzed.
    pub analyzed: bool,
}

/// Mock implementation of `ResultStore` for testing.
///
/// Captures calls for later assertions.
pub struct MockResultStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    fail: bool,
}

impl MockResultStore {
    /// Creates a store that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Creates a store whose every write fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Returns all captured calls.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for MockResultStore {
    fn store(
        &self,
        original: &[u8],
        original_name: &str,
        result: &PipelineResult,
    ) -> anyhow::Result<StoredRecord> {
        let analyzed = matches!(result.outcome, Outcome::Analyzed(_));
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoreCall {
                original_name: original_name.to_string(),
                bytes: original.len(),
                analyzed,
            });

        if self.fail {
            anyhow::bail!("disk full");
        }

        let eye = |side: &str| analyzed.then(|| format!("mock://two_eyes/{side}_{original_name}"));
        Ok(StoredRecord {
            id: analyzed.then_some(1),
            original: format!("mock://{original_name}"),
            left_eye: eye("left"),
            right_eye: eye("right"),
        })
    }
}
