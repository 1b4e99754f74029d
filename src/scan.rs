//! Strided detection scan.
//!
//! The scan walks a stream in order and analyses frames 1, 1 + skip,
//! 1 + 2*skip, ... Each analysed frame is JPEG-encoded and sent to the
//! detector. The first detection the classifier accepts ends the scan; the
//! whole response for that frame is returned with it so every box can be
//! drawn, not only the one that triggered acceptance.
//!
//! Frames between targets are still decoded, because sources have no seek.
//! The stream is released exactly once whatever the outcome.

use crate::classify::Classifier;
use crate::detect::{Detection, DetectionResponse, DetectorBackend};
use crate::error::TriageError;
use crate::frame::Frame;
use crate::geometry::Roi;
use crate::ingest::{FrameSource, StreamGuard};

/// Frames advanced between analysed samples, roughly half a second of a
/// typical camera clip.
pub const DEFAULT_FRAME_SKIP: u64 = 15;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct ScanSettings {
    pub frame_skip: u64,
    pub min_confidence: f32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.frame_skip == 0 {
            return Err(TriageError::Config(
                "frame skip must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(TriageError::Config(format!(
                "min confidence must be within 0..=1, got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames_decoded: u64,
    pub frames_analysed: u64,
}

/// Terminal outcome of one scan.
#[derive(Clone, Debug)]
pub enum AcceptedResult {
    Accepted {
        frame: Frame,
        /// Full response for the accepted frame, in detector order.
        response: DetectionResponse,
        /// Position of the detection that triggered acceptance.
        trigger: usize,
        stats: ScanStats,
    },
    Rejected {
        /// The first frame could not be read.
        unreadable: bool,
        stats: ScanStats,
    },
}

impl AcceptedResult {
    pub(crate) fn unreadable() -> Self {
        Self::Rejected {
            unreadable: true,
            stats: ScanStats::default(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Self::Accepted { frame, .. } => Some(frame),
            Self::Rejected { .. } => None,
        }
    }

    pub fn response(&self) -> Option<&DetectionResponse> {
        match self {
            Self::Accepted { response, .. } => Some(response),
            Self::Rejected { .. } => None,
        }
    }

    /// The detection that triggered acceptance.
    pub fn trigger(&self) -> Option<&Detection> {
        match self {
            Self::Accepted {
                response, trigger, ..
            } => response.detections.get(*trigger),
            Self::Rejected { .. } => None,
        }
    }

    pub fn stats(&self) -> ScanStats {
        match self {
            Self::Accepted { stats, .. } | Self::Rejected { stats, .. } => *stats,
        }
    }

    /// `(accepted, frame, response)` triple.
    pub fn into_parts(self) -> (bool, Option<Frame>, Option<DetectionResponse>) {
        match self {
            Self::Accepted {
                frame, response, ..
            } => (true, Some(frame), Some(response)),
            Self::Rejected { .. } => (false, None, None),
        }
    }
}

/// Scan `source` until the first accepted detection or end-of-stream.
///
/// An unreadable first frame is logged and reported as a rejection. A read
/// error later in the stream is logged and treated as end-of-stream.
/// Detector failures end the scan as `TriageError::Detection`, which names
/// the backend and keeps the backend's error as its `source`; they are never
/// retried. Frame encoding failures end it as `TriageError::Encode`.
pub fn scan<S, D>(
    source: S,
    detector: &mut D,
    classifier: &Classifier,
    settings: &ScanSettings,
    roi: Option<&Roi>,
) -> Result<AcceptedResult, TriageError>
where
    S: FrameSource,
    D: DetectorBackend + ?Sized,
{
    let mut stream = StreamGuard::new(source);
    settings.validate()?;
    let mut stats = ScanStats::default();

    let mut current = match stream.next_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            log::error!("Unable to read {}: stream is empty", stream.name());
            stream.release();
            return Ok(AcceptedResult::unreadable());
        }
        Err(e) => {
            log::error!("Unable to read {}: {:#}", stream.name(), e);
            stream.release();
            return Ok(AcceptedResult::unreadable());
        }
    };

    let mut current_index: u64 = 1;
    let mut target_index: u64 = 1;

    loop {
        stats.frames_decoded += 1;

        if current_index == target_index {
            stats.frames_analysed += 1;
            let jpeg = current.encode_jpeg()?;
            let response = detector
                .detect(&jpeg, settings.min_confidence)
                .map_err(|source| TriageError::Detection {
                    backend: detector.name().to_string(),
                    source,
                })?;
            log::debug!(
                "{}: frame {} -> {} detection(s)",
                stream.name(),
                current_index,
                response.len()
            );

            if let Some(trigger) = classifier.first_accepted(&response.detections, roi) {
                stream.release();
                return Ok(AcceptedResult::Accepted {
                    frame: current,
                    response,
                    trigger,
                    stats,
                });
            }
            target_index = match target_index.checked_add(settings.frame_skip) {
                Some(next) => next,
                // No later frame can be a target.
                None => break,
            };
        }

        current = match stream.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::warn!(
                    "{}: read failed after frame {}, treating as end of stream: {:#}",
                    stream.name(),
                    current_index,
                    e
                );
                break;
            }
        };
        current_index += 1;
    }

    stream.release();
    Ok(AcceptedResult::Rejected {
        unreadable: false,
        stats,
    })
}
