use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResponse};

/// Scripted backend for tests and dry runs.
///
/// Answers are keyed by call number (1-based): the Nth analysed frame gets
/// the Nth script entry. Unscripted calls return an empty response.
/// Confidence filtering is applied like a real service would.
#[derive(Debug, Default)]
pub struct StubBackend {
    script: BTreeMap<u64, Vec<Detection>>,
    fail_on: Option<u64>,
    calls: u64,
    thresholds: Vec<f32>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detections to report on the given call.
    pub fn on_call(mut self, call: u64, detections: Vec<Detection>) -> Self {
        self.script.insert(call, detections);
        self
    }

    /// Fail the given call, as an unreachable service would.
    pub fn failing_on(mut self, call: u64) -> Self {
        self.fail_on = Some(call);
        self
    }

    /// Number of detect calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Confidence threshold passed on each call, in call order.
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(&mut self, jpeg: &[u8], min_confidence: f32) -> Result<DetectionResponse> {
        self.calls += 1;
        self.thresholds.push(min_confidence);

        if self.fail_on == Some(self.calls) {
            return Err(anyhow!("stub backend unavailable on call {}", self.calls));
        }
        if jpeg.is_empty() {
            return Err(anyhow!("stub backend received an empty image"));
        }

        let detections = self
            .script
            .get(&self.calls)
            .map(|dets| {
                dets.iter()
                    .filter(|d| d.confidence >= min_confidence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(DetectionResponse::new(detections))
    }
}
