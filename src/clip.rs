//! Clip descriptor.
//!
//! Camera recordings arrive named `<camera name>_<camera num>_<YYYYMMDDHHMMSS>`
//! (for example `Front Door_01_20210511082721.mp4`). A `Clip` carries the
//! identity parsed from that name, renders the friendly
//! `2021-05-11 08-27-21 (Front Door).mp4` form, and drives the scan, rename
//! and snapshot export for one recording.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use image::ImageFormat;
use regex::Regex;

use crate::annotate::{self, LabelFont};
use crate::classify::Classifier;
use crate::detect::{DetectionResponse, DetectorBackend};
use crate::error::TriageError;
use crate::frame::Frame;
use crate::geometry::Roi;
use crate::ingest::{classify_open_failure, FileSource, FrameSource};
use crate::scan::{scan, AcceptedResult, ScanSettings};

pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const FRIENDLY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";
pub const DEFAULT_CAMERA_NUM: &str = "01";

/// Timestamp used when a filename carries none: 2000-01-01 01:00:00.
pub fn sentinel_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(1, 0, 0))
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraIdentity {
    pub camera_name: String,
    pub camera_num: String,
    pub timestamp: NaiveDateTime,
}

/// Outcome of reading a camera identity out of a filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityParse {
    Parsed(CameraIdentity),
    /// The name did not match; defaults were substituted.
    Fallback {
        identity: CameraIdentity,
        reason: String,
    },
}

impl IdentityParse {
    pub fn identity(&self) -> &CameraIdentity {
        match self {
            Self::Parsed(identity) | Self::Fallback { identity, .. } => identity,
        }
    }

    pub fn into_identity(self) -> CameraIdentity {
        match self {
            Self::Parsed(identity) | Self::Fallback { identity, .. } => identity,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Split `<camera name>_<camera num>_<timestamp>` from the right.
///
/// Never fails: anything that does not match yields the default camera,
/// camera number `01` and the sentinel timestamp.
pub fn parse_identity(filename: &str, default_camera: &str) -> IdentityParse {
    match try_parse_identity(filename) {
        Ok(identity) => IdentityParse::Parsed(identity),
        Err(reason) => IdentityParse::Fallback {
            identity: CameraIdentity {
                camera_name: default_camera.to_string(),
                camera_num: DEFAULT_CAMERA_NUM.to_string(),
                timestamp: sentinel_timestamp(),
            },
            reason,
        },
    }
}

fn try_parse_identity(filename: &str) -> Result<CameraIdentity, String> {
    static TIMESTAMP_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let parts: Vec<&str> = filename.rsplitn(3, '_').collect();
    let [raw_timestamp, camera_num, camera_name] = parts.as_slice() else {
        return Err(format!("expected 3 '_'-separated parts, found {}", parts.len()));
    };
    if camera_name.is_empty() {
        return Err("camera name is empty".to_string());
    }
    let digits = TIMESTAMP_RE
        .get_or_init(|| Regex::new(r"^\d{14}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(raw_timestamp));
    if !digits {
        return Err(format!("'{}' is not a 14-digit timestamp", raw_timestamp));
    }
    let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, FILENAME_TIMESTAMP_FORMAT)
        .map_err(|e| format!("'{}' is not a valid timestamp: {}", raw_timestamp, e))?;

    Ok(CameraIdentity {
        camera_name: camera_name.to_string(),
        camera_num: camera_num.to_string(),
        timestamp,
    })
}

/// One recording on disk. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct Clip {
    dir: PathBuf,
    filename: String,
    extension: String,
    identity: IdentityParse,
}

impl Clip {
    pub fn new(
        dir: impl Into<PathBuf>,
        filename: impl Into<String>,
        extension: impl Into<String>,
        default_camera: &str,
    ) -> Self {
        let filename = filename.into();
        let identity = parse_identity(&filename, default_camera);
        if let IdentityParse::Fallback { reason, .. } = &identity {
            log::info!(
                "Filename '{}' not in camera format ({}); using generic identity",
                filename,
                reason
            );
        }
        Self {
            dir: dir.into(),
            filename,
            extension: extension.into(),
            identity,
        }
    }

    pub fn from_path(path: &Path, default_camera: &str) -> Result<Self, TriageError> {
        let invalid = || {
            TriageError::fs(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "clip path has no UTF-8 file name",
                ),
            )
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(invalid)?;
        let extension = match path.extension() {
            Some(ext) => ext.to_str().ok_or_else(invalid)?,
            None => "",
        };
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::new(dir, stem, extension, default_camera))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn camera_name(&self) -> &str {
        &self.identity.identity().camera_name
    }

    pub fn camera_num(&self) -> &str {
        &self.identity.identity().camera_num
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.identity.identity().timestamp
    }

    pub fn identity(&self) -> &IdentityParse {
        &self.identity
    }

    pub fn filename_with_ext(&self) -> String {
        join_extension(&self.filename, &self.extension)
    }

    pub fn full_path(&self) -> PathBuf {
        self.dir.join(self.filename_with_ext())
    }

    pub fn friendly_timestamp(&self) -> String {
        self.timestamp().format(FRIENDLY_TIMESTAMP_FORMAT).to_string()
    }

    /// `YYYY-MM-DD HH-MM-SS (<camera name>).<ext>`; the clip's own
    /// extension unless one is given.
    pub fn friendly_name(&self, extension: Option<&str>) -> String {
        join_extension(&self.friendly_stem(), extension.unwrap_or(&self.extension))
    }

    /// `YYYY-MM-DD HH-MM-SS (<camera name>)` without an extension.
    pub fn friendly_stem(&self) -> String {
        format!("{} ({})", self.friendly_timestamp(), self.camera_name())
    }

    /// Open the clip from disk and scan it.
    ///
    /// A clip that cannot be opened is logged and rejected, the same as one
    /// whose first frame cannot be read. A build without a decoder is an
    /// error instead: the clip was never looked at.
    pub fn run_acceptance<D>(
        &self,
        detector: &mut D,
        classifier: &Classifier,
        settings: &ScanSettings,
        roi: Option<&Roi>,
    ) -> Result<AcceptedResult, TriageError>
    where
        D: DetectorBackend + ?Sized,
    {
        log::info!("ANALYSING {}", self.filename_with_ext());
        let source = match FileSource::open(&self.full_path()) {
            Ok(source) => source,
            Err(e) => {
                let e = classify_open_failure(e)?;
                log::error!("Unable to read {}: {:#}", self.filename_with_ext(), e);
                log::info!("REJECTED {}", self.filename_with_ext());
                return Ok(AcceptedResult::unreadable());
            }
        };
        let result = scan(source, detector, classifier, settings, roi)?;
        self.log_outcome(&result);
        Ok(result)
    }

    /// Scan an already opened stream for this clip.
    pub fn run_acceptance_with<S, D>(
        &self,
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
        log::info!("ANALYSING {}", self.filename_with_ext());
        let result = scan(source, detector, classifier, settings, roi)?;
        self.log_outcome(&result);
        Ok(result)
    }

    fn log_outcome(&self, result: &AcceptedResult) {
        match result.trigger() {
            Some(detection) => log::info!(
                "ACCEPTED {}, {} detected ({:.1}%)",
                self.filename_with_ext(),
                detection.label,
                detection.confidence_percent()
            ),
            None => log::info!("REJECTED {}", self.filename_with_ext()),
        }
    }

    /// Rename the clip to its friendly name inside `target_dir`.
    ///
    /// When that name is taken (fallback identities all share one, and two
    /// cameras may share a name and second) a `-2`, `-3`, ... suffix is added
    /// to the stem. Existing files are never replaced.
    pub fn relocate(&self, target_dir: &Path) -> Result<PathBuf, TriageError> {
        let source = self.full_path();
        if !source.is_file() {
            return Err(TriageError::fs(
                &source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "clip no longer exists"),
            ));
        }
        let target = self.free_destination(target_dir);
        std::fs::rename(&source, &target).map_err(|e| TriageError::fs(&target, e))?;
        log::info!("moved {} -> {}", source.display(), target.display());
        Ok(target)
    }

    fn free_destination(&self, target_dir: &Path) -> PathBuf {
        let stem = self.friendly_stem();
        let mut target = target_dir.join(join_extension(&stem, &self.extension));
        let mut n: u64 = 2;
        while target.exists() {
            target = target_dir.join(join_extension(&format!("{}-{}", stem, n), &self.extension));
            n += 1;
        }
        target
    }

    /// Draw every detection of `response` (captioned when `font` is given,
    /// ROI optional) onto the frame and write one JPEG per output path.
    pub fn export_annotated(
        &self,
        frame: &Frame,
        response: &DetectionResponse,
        outputs: &[PathBuf],
        draw_roi: bool,
        roi: Option<&Roi>,
        font: Option<&LabelFont>,
    ) -> Result<(), TriageError> {
        let mut image = annotate::annotate(frame.image(), response, font);
        if let (true, Some(roi)) = (draw_roi, roi) {
            annotate::draw_roi(&mut image, roi);
        }
        for output in outputs {
            image
                .save_with_format(output, ImageFormat::Jpeg)
                .map_err(|e| TriageError::encode(output.display().to_string(), e))?;
            log::debug!("wrote snapshot {}", output.display());
        }
        Ok(())
    }
}

fn join_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}
