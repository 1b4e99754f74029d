//! Inbox triage.
//!
//! `Triage` ties the pieces together for a directory of recordings: every
//! clip is scanned; accepted clips get annotated snapshots and move to the
//! accepted directory under their friendly name; rejected clips move to the
//! rejected directory when one is configured and stay put otherwise.
//!
//! One clip failing (detector down, rename refused) is logged and counted;
//! the rest of the batch still runs.

use std::path::{Path, PathBuf};

use crate::annotate::LabelFont;
use crate::classify::Classifier;
use crate::clip::Clip;
use crate::config::TriageConfig;
use crate::detect::{Detection, DetectorBackend};
use crate::error::TriageError;
use crate::geometry::Roi;
use crate::ingest::{classify_open_failure, FileSource, FrameSource};
use crate::scan::{AcceptedResult, ScanSettings};

/// Opens a frame source for a clip path.
pub trait SourceOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>>;
}

/// Opens clips from disk through `FileSource`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOpener;

impl SourceOpener for FileOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>> {
        Ok(Box::new(FileSource::open(path)?))
    }
}

impl<F> SourceOpener for F
where
    F: Fn(&Path) -> anyhow::Result<Box<dyn FrameSource>>,
{
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>> {
        self(path)
    }
}

/// Where accepted clips and their snapshots go.
#[derive(Clone, Debug)]
pub struct TriageLayout {
    pub inbox_dir: PathBuf,
    pub accepted_dir: PathBuf,
    pub rejected_dir: Option<PathBuf>,
    pub images_dir: PathBuf,
    pub image_outputs: Vec<String>,
    pub extensions: Vec<String>,
}

impl TriageLayout {
    pub fn from_config(cfg: &TriageConfig) -> Self {
        Self {
            inbox_dir: cfg.inbox_dir.clone(),
            accepted_dir: cfg.accepted_dir.clone(),
            rejected_dir: cfg.rejected_dir.clone(),
            images_dir: cfg.images_dir.clone(),
            image_outputs: cfg.image_outputs.clone(),
            extensions: cfg.extensions.clone(),
        }
    }

    /// Create every output directory that does not exist yet.
    pub fn ensure_dirs(&self) -> Result<(), TriageError> {
        let mut dirs = vec![&self.accepted_dir, &self.images_dir];
        dirs.extend(self.rejected_dir.as_ref());
        for dir in dirs {
            std::fs::create_dir_all(dir).map_err(|e| TriageError::fs(dir, e))?;
        }
        Ok(())
    }

    /// Resolve the snapshot templates for one clip.
    ///
    /// `{friendly}` becomes `stem` with a `.jpg` extension (the stem the
    /// clip was relocated under), `{camera}` the camera name. Relative
    /// results land in `images_dir`.
    pub fn snapshot_paths(&self, clip: &Clip, stem: &str) -> Vec<PathBuf> {
        let friendly = format!("{}.jpg", stem);
        self.image_outputs
            .iter()
            .map(|template| {
                let rendered = template
                    .replace("{friendly}", &friendly)
                    .replace("{camera}", clip.camera_name());
                let path = PathBuf::from(rendered);
                if path.is_absolute() {
                    path
                } else {
                    self.images_dir.join(path)
                }
            })
            .collect()
    }
}

/// What happened to one clip.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipDisposition {
    Accepted {
        detection: Detection,
        frame_index: u64,
        moved_to: PathBuf,
        snapshots: Vec<PathBuf>,
    },
    Rejected {
        moved_to: Option<PathBuf>,
        unreadable: bool,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.failed
    }
}

/// List recordings in `inbox` with one of `extensions`, sorted by name.
pub fn discover_clips(inbox: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, TriageError> {
    let entries = std::fs::read_dir(inbox).map_err(|e| TriageError::fs(inbox, e))?;
    let mut clips = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TriageError::fs(inbox, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if matches {
            clips.push(path);
        }
    }
    clips.sort();
    Ok(clips)
}

pub struct Triage<D, O = FileOpener> {
    detector: D,
    opener: O,
    classifier: Classifier,
    settings: ScanSettings,
    roi: Option<Roi>,
    draw_roi: bool,
    font: Option<LabelFont>,
    default_camera: String,
    layout: TriageLayout,
}

impl<D: DetectorBackend> Triage<D, FileOpener> {
    pub fn from_config(cfg: &TriageConfig, detector: D) -> Self {
        Self {
            detector,
            opener: FileOpener,
            classifier: Classifier::new(cfg.labels.clone()),
            settings: cfg.scan.clone(),
            roi: cfg.roi.clone(),
            draw_roi: cfg.draw_roi,
            font: LabelFont::discover(cfg.font_path.as_deref()),
            default_camera: cfg.default_camera.clone(),
            layout: TriageLayout::from_config(cfg),
        }
    }
}

impl<D: DetectorBackend, O: SourceOpener> Triage<D, O> {
    /// Swap how clips are opened.
    pub fn with_opener<P: SourceOpener>(self, opener: P) -> Triage<D, P> {
        Triage {
            detector: self.detector,
            opener,
            classifier: self.classifier,
            settings: self.settings,
            roi: self.roi,
            draw_roi: self.draw_roi,
            font: self.font,
            default_camera: self.default_camera,
            layout: self.layout,
        }
    }

    pub fn layout(&self) -> &TriageLayout {
        &self.layout
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Scan one clip and file it.
    pub fn process_clip(&mut self, path: &Path) -> Result<ClipDisposition, TriageError> {
        let clip = Clip::from_path(path, &self.default_camera)?;
        let result = match self.opener.open(&clip.full_path()) {
            Ok(source) => clip.run_acceptance_with(
                source,
                &mut self.detector,
                &self.classifier,
                &self.settings,
                self.roi.as_ref(),
            )?,
            Err(e) => {
                let e = classify_open_failure(e)?;
                log::error!("Unable to read {}: {:#}", clip.filename_with_ext(), e);
                log::info!("REJECTED {}", clip.filename_with_ext());
                AcceptedResult::unreadable()
            }
        };

        match result {
            AcceptedResult::Accepted {
                frame,
                response,
                trigger,
                ..
            } => {
                // The clip leaves the inbox before any snapshot is written.
                let moved_to = clip.relocate(&self.layout.accepted_dir)?;
                let stem = moved_to
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| clip.friendly_stem());
                let snapshots = self.layout.snapshot_paths(&clip, &stem);
                clip.export_annotated(
                    &frame,
                    &response,
                    &snapshots,
                    self.draw_roi,
                    self.roi.as_ref(),
                    self.font.as_ref(),
                )?;
                Ok(ClipDisposition::Accepted {
                    detection: response.detections[trigger].clone(),
                    frame_index: frame.index(),
                    moved_to,
                    snapshots,
                })
            }
            AcceptedResult::Rejected { unreadable, .. } => {
                let moved_to = match &self.layout.rejected_dir {
                    Some(dir) => Some(clip.relocate(dir)?),
                    None => None,
                };
                Ok(ClipDisposition::Rejected {
                    moved_to,
                    unreadable,
                })
            }
        }
    }

    /// Process every clip currently in the inbox.
    pub fn process_inbox(&mut self) -> Result<BatchSummary, TriageError> {
        self.process_inbox_until(|| false)
    }

    /// Like `process_inbox`, checking `stop` before each clip. A clip that
    /// has started is always finished.
    pub fn process_inbox_until<F>(&mut self, stop: F) -> Result<BatchSummary, TriageError>
    where
        F: Fn() -> bool,
    {
        let clips = discover_clips(&self.layout.inbox_dir, &self.layout.extensions)?;
        let mut summary = BatchSummary::default();
        for path in clips {
            if stop() {
                log::info!("stop requested, leaving remaining clips for later");
                break;
            }
            match self.process_clip(&path) {
                Ok(ClipDisposition::Accepted { .. }) => summary.accepted += 1,
                Ok(ClipDisposition::Rejected { .. }) => summary.rejected += 1,
                Err(e) => {
                    log::warn!("failed to triage {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        if summary.total() > 0 {
            log::info!(
                "batch done: {} accepted, {} rejected, {} failed",
                summary.accepted,
                summary.rejected,
                summary.failed
            );
        }
        Ok(summary)
    }
}
