use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::LabelSet;
use crate::geometry::Roi;
use crate::scan::{ScanSettings, DEFAULT_FRAME_SKIP, DEFAULT_MIN_CONFIDENCE};

const DEFAULT_INBOX_DIR: &str = "inbox";
const DEFAULT_ACCEPTED_DIR: &str = "accepted";
const DEFAULT_IMAGES_DIR: &str = "images";
const DEFAULT_IMAGE_OUTPUTS: [&str; 2] = ["{friendly}", "latest.jpg"];
const DEFAULT_EXTENSIONS: [&str; 1] = ["mp4"];
const DEFAULT_VALID_LABELS: &str = "person";
const DEFAULT_CAMERA: &str = "Camera 1";
const DEFAULT_DETECTOR: &str = "deepstack";
const DEFAULT_DETECTOR_URL: &str = "http://127.0.0.1:80";
const DEFAULT_DETECTOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct TriageConfigFile {
    inbox_dir: Option<PathBuf>,
    accepted_dir: Option<PathBuf>,
    rejected_dir: Option<PathBuf>,
    images_dir: Option<PathBuf>,
    image_outputs: Option<Vec<String>>,
    extensions: Option<Vec<String>>,
    poll_interval_secs: Option<u64>,
    labels: Option<LabelsConfigFile>,
    scan: Option<ScanConfigFile>,
    roi: Option<RoiConfigFile>,
    font: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelsConfigFile {
    valid: Option<Vec<String>>,
    default_camera: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    frame_skip: Option<u64>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct RoiConfigFile {
    points: Option<Vec<[f64; 2]>>,
    draw: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub inbox_dir: PathBuf,
    pub accepted_dir: PathBuf,
    pub rejected_dir: Option<PathBuf>,
    pub images_dir: PathBuf,
    /// Snapshot targets. `{friendly}` and `{camera}` are substituted per clip.
    pub image_outputs: Vec<String>,
    pub extensions: Vec<String>,
    pub poll_interval: Duration,
    pub labels: LabelSet,
    pub default_camera: String,
    pub scan: ScanSettings,
    pub roi: Option<Roi>,
    pub draw_roi: bool,
    /// Caption font. System fonts are tried when unset.
    pub font_path: Option<PathBuf>,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR.to_string(),
            url: DEFAULT_DETECTOR_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_DETECTOR_TIMEOUT_SECS),
        }
    }
}

impl TriageConfig {
    /// File (if `TRIAGE_CONFIG` is set), then environment, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRIAGE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TriageConfigFile) -> Result<Self> {
        let labels = match file.labels.as_ref().and_then(|l| l.valid.clone()) {
            Some(valid) => LabelSet::new(valid)?,
            None => LabelSet::from_csv(DEFAULT_VALID_LABELS)?,
        };
        let default_camera = file
            .labels
            .and_then(|l| l.default_camera)
            .unwrap_or_else(|| DEFAULT_CAMERA.to_string());
        let scan = ScanSettings {
            frame_skip: file
                .scan
                .as_ref()
                .and_then(|s| s.frame_skip)
                .unwrap_or(DEFAULT_FRAME_SKIP),
            min_confidence: file
                .scan
                .as_ref()
                .and_then(|s| s.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
        };
        let roi = match file.roi.as_ref().and_then(|r| r.points.as_deref()) {
            Some(points) => Some(Roi::from_pairs(points)?),
            None => None,
        };
        let draw_roi = file.roi.and_then(|r| r.draw).unwrap_or(false);
        let defaults = DetectorSettings::default();
        let detector = match file.detector {
            Some(d) => DetectorSettings {
                backend: d.backend.unwrap_or(defaults.backend),
                url: d.url.unwrap_or(defaults.url),
                api_key: d.api_key,
                timeout: d
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            None => defaults,
        };

        Ok(Self {
            inbox_dir: file
                .inbox_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INBOX_DIR)),
            accepted_dir: file
                .accepted_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCEPTED_DIR)),
            rejected_dir: file.rejected_dir,
            images_dir: file
                .images_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR)),
            image_outputs: file
                .image_outputs
                .unwrap_or_else(|| DEFAULT_IMAGE_OUTPUTS.map(String::from).to_vec()),
            extensions: file
                .extensions
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.map(String::from).to_vec()),
            poll_interval: Duration::from_secs(
                file.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS),
            ),
            labels,
            default_camera,
            scan,
            roi,
            draw_roi,
            font_path: file.font,
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = non_empty_env("TRIAGE_INBOX_DIR") {
            self.inbox_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_env("TRIAGE_ACCEPTED_DIR") {
            self.accepted_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_env("TRIAGE_REJECTED_DIR") {
            self.rejected_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty_env("TRIAGE_IMAGES_DIR") {
            self.images_dir = PathBuf::from(dir);
        }
        if let Some(outputs) = non_empty_env("TRIAGE_IMAGE_OUTPUTS") {
            let parsed = split_csv(&outputs);
            if !parsed.is_empty() {
                self.image_outputs = parsed;
            }
        }
        if let Some(extensions) = non_empty_env("TRIAGE_EXTENSIONS") {
            let parsed = split_csv(&extensions);
            if !parsed.is_empty() {
                self.extensions = parsed;
            }
        }
        if let Some(labels) = non_empty_env("VALID_DETECTION_LABELS") {
            self.labels = LabelSet::from_csv(&labels)?;
        }
        if let Some(camera) = non_empty_env("CAMERA_1") {
            self.default_camera = camera;
        }
        if let Some(skip) = non_empty_env("TRIAGE_FRAME_SKIP") {
            self.scan.frame_skip = skip
                .parse()
                .map_err(|_| anyhow!("TRIAGE_FRAME_SKIP must be a positive integer"))?;
        }
        if let Some(confidence) = non_empty_env("TRIAGE_MIN_CONFIDENCE") {
            self.scan.min_confidence = confidence
                .parse()
                .map_err(|_| anyhow!("TRIAGE_MIN_CONFIDENCE must be a number in 0..=1"))?;
        }
        if let Some(roi) = non_empty_env("TRIAGE_ROI") {
            self.roi = Some(Roi::parse(&roi)?);
        }
        if let Some(draw) = non_empty_env("TRIAGE_DRAW_ROI") {
            self.draw_roi = parse_bool(&draw)
                .ok_or_else(|| anyhow!("TRIAGE_DRAW_ROI must be true or false"))?;
        }
        if let Some(font) = non_empty_env("TRIAGE_FONT") {
            self.font_path = Some(PathBuf::from(font));
        }
        if let Some(backend) = non_empty_env("TRIAGE_DETECTOR") {
            self.detector.backend = backend;
        }
        if let Some(url) = non_empty_env("DEEPSTACK_URL") {
            self.detector.url = url;
        }
        if let Some(key) = non_empty_env("DEEPSTACK_API_KEY") {
            self.detector.api_key = Some(key);
        }
        if let Some(timeout) = non_empty_env("TRIAGE_DETECTOR_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("TRIAGE_DETECTOR_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.detector.timeout = Duration::from_secs(seconds);
        }
        if let Some(poll) = non_empty_env("TRIAGE_POLL_SECS") {
            let seconds: u64 = poll
                .parse()
                .map_err(|_| anyhow!("TRIAGE_POLL_SECS must be an integer number of seconds"))?;
            self.poll_interval = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.scan.validate()?;
        if self.default_camera.trim().is_empty() {
            return Err(anyhow!("default camera name must not be empty"));
        }
        self.extensions = self
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if self.extensions.is_empty() {
            return Err(anyhow!("at least one clip extension is required"));
        }
        if self.image_outputs.iter().any(|o| o.trim().is_empty()) {
            return Err(anyhow!("image outputs must not be empty"));
        }
        if self.poll_interval.as_secs() == 0 {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        if let Some(font) = self.font_path.as_ref().filter(|p| !p.is_file()) {
            return Err(anyhow!("caption font {} is not a file", font.display()));
        }
        if self.detector.timeout.as_secs() == 0 {
            return Err(anyhow!("detector timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TriageConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
