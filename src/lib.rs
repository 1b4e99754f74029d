//! Motion clip triage
//!
//! This crate decides whether a motion-triggered camera recording contains
//! an object of interest, and files it accordingly.
//!
//! # Architecture
//!
//! A clip is scanned frame by frame at a fixed stride. Every sampled frame
//! goes to a detection backend; the first detection whose label is in the
//! configured set (and whose box touches the region of interest, if one is
//! set) accepts the clip. Accepted clips get an annotated snapshot and are
//! renamed to `YYYY-MM-DD HH-MM-SS (<camera>).<ext>`.
//!
//! # Module Structure
//!
//! - `geometry`: bounding boxes, ROI polygons, intersection
//! - `classify`: label set and per-detection acceptance
//! - `detect`: detector backend trait, DeepStack and stub backends
//! - `ingest`: frame sources (local files, synthetic, in-memory)
//! - `scan`: strided early-exit scan loop
//! - `clip`: filename identity, friendly names, rename, snapshot export
//! - `annotate`: box and ROI drawing
//! - `pipeline`: inbox discovery and per-clip disposition
//! - `config`: JSON file + environment configuration

pub mod annotate;
pub mod classify;
pub mod clip;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod pipeline;
pub mod scan;

pub use classify::{Classifier, LabelSet};
pub use clip::{parse_identity, CameraIdentity, Clip, IdentityParse};
pub use config::{DetectorSettings, TriageConfig};
#[cfg(feature = "backend-deepstack")]
pub use detect::{DeepStackBackend, DeepStackConfig};
pub use detect::{
    backend_from_settings, Detection, DetectionResponse, DetectorBackend, StubBackend,
};
pub use error::TriageError;
pub use frame::Frame;
pub use geometry::{intersects, BoundingBox, Point, Roi};
pub use ingest::{FileSource, FrameSource, MemorySource, StreamGuard};
pub use pipeline::{
    discover_clips, BatchSummary, ClipDisposition, SourceOpener, Triage, TriageLayout,
};
pub use scan::{scan, AcceptedResult, ScanSettings, ScanStats, DEFAULT_FRAME_SKIP};
