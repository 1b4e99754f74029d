//! Detection acceptance.
//!
//! A detection is accepted when its label is in the configured label set
//! and, if a region of interest is given, its box intersects that region.

use std::collections::BTreeSet;

use crate::detect::Detection;
use crate::error::TriageError;
use crate::geometry::{intersects, Roi};

/// Immutable set of labels that count as objects of interest.
///
/// Matching is exact and case-sensitive. Loaded once at start-up and
/// shared read-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    labels: BTreeSet<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Result<Self, TriageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: BTreeSet<String> = labels
            .into_iter()
            .map(Into::into)
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(TriageError::Config(
                "at least one valid detection label is required".to_string(),
            ));
        }
        Ok(Self { labels })
    }

    /// Parse a comma-separated list such as `person, car, dog`.
    pub fn from_csv(value: &str) -> Result<Self, TriageError> {
        Self::new(value.split(',').map(str::trim))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Decides whether single detections are accepted.
#[derive(Clone, Debug)]
pub struct Classifier {
    labels: LabelSet,
}

impl Classifier {
    pub fn new(labels: LabelSet) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn is_accepted_detection(&self, detection: &Detection, roi: Option<&Roi>) -> bool {
        if !self.labels.contains(&detection.label) {
            return false;
        }
        match roi {
            None => true,
            Some(roi) => intersects(&detection.bounding_box(), roi),
        }
    }

    /// Position of the first accepted detection, in response order.
    pub fn first_accepted(&self, detections: &[Detection], roi: Option<&Roi>) -> Option<usize> {
        detections
            .iter()
            .position(|d| self.is_accepted_detection(d, roi))
    }
}
