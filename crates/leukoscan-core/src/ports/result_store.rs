//! Persistence collaborator port.

use serde::Serialize;

use crate::domain::PipelineResult;

/// References returned by a store after persisting a screening.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    /// Record identifier, when the store keeps records.
    pub id: Option<u64>,
    /// Reference to the stored original image.
    pub original: String,
    /// Reference to the stored left eye image.
    pub left_eye: Option<String>,
    /// Reference to the stored right eye image.
    pub right_eye: Option<String>,
}

/// Port for persisting screening results and their images.
///
/// The pipeline never depends on a store being available: failures are
/// logged by the caller and the response is produced anyway.
pub trait ResultStore: Send + Sync {
    /// Persists `result` together with the uploaded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if anything could not be written.
    fn store(
        &self,
        original: &[u8],
        original_name: &str,
        result: &PipelineResult,
    ) -> anyhow::Result<StoredRecord>;
}
