//! DeepStack-compatible HTTP detection backend.
//!
//! Posts each frame to `/v1/vision/detection` as multipart form data and
//! maps the `predictions` array onto a `DetectionResponse`. The service does
//! the confidence filtering. Nothing is retried here.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResponse};

const DETECTION_PATH: &str = "v1/vision/detection";

/// Configuration for a DeepStack-compatible service.
#[derive(Clone, Debug)]
pub struct DeepStackConfig {
    /// Base URL, e.g. `http://127.0.0.1:80`.
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for DeepStackConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:80".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct DeepStackBackend {
    endpoint: Url,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    predictions: Vec<RawPrediction>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    label: String,
    confidence: f32,
    x_min: i32,
    y_min: i32,
    x_max: i32,
    y_max: i32,
}

impl DeepStackBackend {
    pub fn new(config: DeepStackConfig) -> Result<Self> {
        let base = Url::parse(&config.url).context("parse detector url")?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported detector scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let base = if base.path().ends_with('/') {
            base
        } else {
            let mut with_slash = base.clone();
            with_slash.set_path(&format!("{}/", base.path()));
            with_slash
        };
        let endpoint = base
            .join(DETECTION_PATH)
            .context("build detection endpoint")?;
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build detector http client")?;

        Ok(Self {
            endpoint,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn form(&self, jpeg: &[u8], min_confidence: f32) -> Result<Form> {
        let image = Part::bytes(jpeg.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let mut form = Form::new()
            .part("image", image)
            .text("min_confidence", min_confidence.to_string());
        if let Some(key) = &self.api_key {
            form = form.text("api_key", key.clone());
        }
        Ok(form)
    }
}

impl DetectorBackend for DeepStackBackend {
    fn name(&self) -> &str {
        "deepstack"
    }

    fn detect(&mut self, jpeg: &[u8], min_confidence: f32) -> Result<DetectionResponse> {
        let form = self.form(jpeg, min_confidence)?;
        let response = self
            .client
            .post(self.endpoint.as_str())
            .multipart(form)
            .send()
            .with_context(|| format!("detector request to {} failed", self.endpoint))?;

        let status = response.status();
        let text = response.text().context("read detector response")?;
        if !status.is_success() {
            return Err(anyhow!(
                "detector returned HTTP {}: {}",
                status.as_u16(),
                text.trim()
            ));
        }

        parse_response(&text)
    }
}

/// Map a service reply onto a `DetectionResponse`, keeping prediction order.
pub(crate) fn parse_response(body: &str) -> Result<DetectionResponse> {
    let raw: RawResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("invalid detector response: {}", e))?;
    if !raw.success {
        return Err(anyhow!(
            "detector reported failure: {}",
            raw.error.as_deref().unwrap_or("unknown error")
        ));
    }
    let detections = raw
        .predictions
        .into_iter()
        .map(|p| Detection::new(p.label, p.confidence, [p.x_min, p.y_min, p.x_max, p.y_max]))
        .collect();
    Ok(DetectionResponse::new(detections))
}
