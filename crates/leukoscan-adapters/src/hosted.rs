//! Hosted object detection (Roboflow inference API).
//!
//! The image is sent as a base64 JPEG body to `{api_url}/{model_id}` with the
//! API key in the query string. The service answers with center/size boxes
//! in the pixel space of the submitted image.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use leukoscan_core::codec::encode_jpeg;
use leukoscan_core::domain::DetectionBox;
use leukoscan_core::ports::Detector;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::client::checked_text;

#[derive(Debug, Deserialize)]
struct HostedResponse {
    #[serde(default)]
    predictions: Vec<HostedPrediction>,
}

#[derive(Debug, Deserialize)]
struct HostedPrediction {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

/// [`Detector`] backed by a hosted detection model.
pub struct HostedDetector {
    client: Client,
    endpoint: String,
    model_id: String,
    api_key: String,
}

impl HostedDetector {
    /// Creates a detector for `model_id` (e.g. `eye-detection-kso3d/3`) served at `api_url`.
    #[must_use]
    pub fn new(client: Client, api_url: &str, model_id: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/{}", api_url.trim_end_matches('/'), model_id),
            model_id: model_id.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Full URL requests are posted to, without the key.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Detector for HostedDetector {
    fn name(&self) -> &str {
        &self.model_id
    }

    fn infer(&self, image: &DynamicImage) -> Result<Vec<DetectionBox>> {
        let jpeg = encode_jpeg(image).context("Failed to encode image for upload")?;
        let payload = STANDARD.encode(jpeg);

        debug!("POST {} ({} base64 bytes)", self.endpoint, payload.len());
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(payload)
            .send()
            .with_context(|| format!("Request to {} failed", self.model_id))?;

        let body = checked_text(response, &self.model_id)?;
        parse_predictions(&body)
            .with_context(|| format!("Unexpected response from {}", self.model_id))
    }
}

fn parse_predictions(body: &str) -> Result<Vec<DetectionBox>> {
    let parsed: HostedResponse = serde_json::from_str(body)?;
    Ok(parsed
        .predictions
        .into_iter()
        .map(|p| DetectionBox::new(p.x, p.y, p.width, p.height, p.confidence))
        .collect())
}
