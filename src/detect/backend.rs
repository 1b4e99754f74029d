use anyhow::Result;

use crate::detect::result::DetectionResponse;

/// Detection capability seam.
///
/// Backends receive an encoded JPEG and a confidence threshold and return
/// every detection at or above that threshold, in their native order.
/// Filtering by confidence is the backend's job; label and region filtering
/// happen in the classifier.
///
/// Failures are returned as-is. The scan loop never retries a backend call.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Run detection on one encoded frame.
    fn detect(&mut self, jpeg: &[u8], min_confidence: f32) -> Result<DetectionResponse>;

    /// Optional warm-up hook, called once before the first batch.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, jpeg: &[u8], min_confidence: f32) -> Result<DetectionResponse> {
        (**self).detect(jpeg, min_confidence)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
