use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// One candidate object reported by a detector backend.
///
/// Coordinates are frame pixels, as DeepStack-style services report them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bounds: [i32; 4]) -> Self {
        let [x_min, y_min, x_max, y_max] = bounds;
        Self {
            label: label.into(),
            confidence,
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x_min as f64,
            self.y_min as f64,
            self.x_max as f64,
            self.y_max as f64,
        )
    }

    /// Confidence as a percentage for log lines.
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

/// Detections for a single frame, in the order the backend produced them.
///
/// The order is significant: it breaks ties when several detections in one
/// frame would be accepted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
}

impl DetectionResponse {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}
