//! Leukocoria classifier served over HTTP.

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use leukoscan_core::codec::encode_jpeg;
use leukoscan_core::domain::DECISION_THRESHOLD;
use leukoscan_core::ports::LeukocoriaClassifier;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::checked_text;

#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    prediction: f32,
    #[serde(default)]
    has_leukocoria: Option<bool>,
}

/// [`LeukocoriaClassifier`] that posts the crop to a prediction service.
///
/// The crop goes out as multipart field `image` (`iris.jpg`); the service
/// replies with `{"prediction": p, "has_leukocoria": bool}`. Only the
/// probability is used; the verdict is recomputed locally.
pub struct RemoteClassifier {
    client: Client,
    url: String,
}

impl RemoteClassifier {
    /// Creates a classifier posting to `url`.
    #[must_use]
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

impl LeukocoriaClassifier for RemoteClassifier {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn classify(&self, crop: &RgbImage) -> Result<f32> {
        let jpeg = encode_jpeg(&DynamicImage::ImageRgb8(crop.clone()))
            .context("Failed to encode iris crop")?;

        let form = Form::new().part(
            "image",
            Part::bytes(jpeg)
                .file_name("iris.jpg")
                .mime_str("image/jpeg")?,
        );

        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .with_context(|| format!("Request to classifier at {} failed", self.url))?;

        let body = checked_text(response, "classifier")?;
        let verdict: RemoteVerdict =
            serde_json::from_str(&body).context("Unexpected response from classifier")?;

        if let Some(remote_flag) = verdict.has_leukocoria {
            if remote_flag != (verdict.prediction > DECISION_THRESHOLD) {
                warn!(
                    "Classifier flag {remote_flag} disagrees with its prediction {:.4}",
                    verdict.prediction
                );
            }
        }
        Ok(verdict.prediction)
    }
}
