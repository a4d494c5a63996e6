use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{OcrError, Result};

use super::result::{mean_confidence, BoundingBox, RecognitionResult};

/// Languages the multilingual service recognizes.
pub const MULTILINGUAL_LANGUAGES: [&str; 8] = ["en", "vi", "ch_sim", "ja", "ko", "th", "ar", "hi"];

/// Client for the local multilingual OCR service.
#[derive(Clone, Debug)]
pub struct MultilingualClient {
    client: Client,
    base_url: String,
    languages: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image_base64: String,
    languages: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TextBox {
    #[serde(rename = "box", default)]
    polygon: Vec<[f64; 2]>,
    text: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
}

impl MultilingualClient {
    /// Build a client for `language` and confirm the service answers its health probe.
    pub fn connect(base_url: &str, language: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let reader = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            languages: vec![language.to_string()],
        };
        reader.health_check()?;
        Ok(reader)
    }

    pub fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().map_err(|e| {
            OcrError::BackendUnavailable(format!("OCR service health check failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(OcrError::BackendUnavailable(format!(
                "OCR service unhealthy: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Send the file to `/ocr` and collect its segments in service order.
    pub fn recognize(&self, image_path: &Path) -> Result<RecognitionResult> {
        let bytes = std::fs::read(image_path)?;
        let request = OcrRequest {
            image_base64: STANDARD.encode(&bytes),
            languages: &self.languages,
        };

        let url = format!("{}/ocr", self.base_url);
        let response = self.client.post(&url).json(&request).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OcrError::BackendExecution(format!(
                "OCR service error ({status}): {error_text}"
            )));
        }

        let data: OcrResponse = response.json().map_err(|e| {
            OcrError::BackendExecution(format!("Failed to parse OCR service response: {e}"))
        })?;

        Ok(into_result(data.boxes))
    }
}

fn into_result(boxes: Vec<TextBox>) -> RecognitionResult {
    let text_parts: Vec<String> = boxes.iter().map(|b| b.text.clone()).collect();
    let confidences: Vec<f32> = boxes.iter().map(|b| b.score).collect();
    let bounding_boxes = boxes
        .iter()
        .map(|b| BoundingBox::from_polygon(&b.polygon))
        .collect();

    RecognitionResult {
        text: text_parts.join(" "),
        confidence: Some(mean_confidence(&confidences)),
        text_parts,
        confidences,
        bounding_boxes,
    }
}
