//! clip_scan - scan a single recording and print the verdict as JSON

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clip_triage::annotate::LabelFont;
use clip_triage::{
    backend_from_settings, AcceptedResult, Classifier, Clip, DetectorSettings, FileSource,
    LabelSet, Roi, ScanSettings, DEFAULT_FRAME_SKIP,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan one clip for objects of interest")]
struct Args {
    /// Recording to scan (`stub://N` for a synthetic N-frame clip).
    path: PathBuf,
    /// Comma-separated labels that accept a clip.
    #[arg(long, env = "VALID_DETECTION_LABELS", default_value = "person")]
    labels: String,
    /// Minimum confidence forwarded to the detector.
    #[arg(long, default_value_t = 0.5)]
    min_confidence: f32,
    /// Frames advanced between analysed samples.
    #[arg(long, default_value_t = DEFAULT_FRAME_SKIP)]
    frame_skip: u64,
    /// Region of interest as `x,y;x,y;x,y...` in frame pixels.
    #[arg(long)]
    roi: Option<String>,
    /// Camera name used when the filename carries none.
    #[arg(long, env = "CAMERA_1", default_value = "Camera 1")]
    camera: String,
    /// Detector backend (deepstack|stub).
    #[arg(long, env = "TRIAGE_DETECTOR", default_value = "deepstack")]
    detector: String,
    /// DeepStack base URL.
    #[arg(long, env = "DEEPSTACK_URL", default_value = "http://127.0.0.1:80")]
    detector_url: String,
    /// DeepStack API key.
    #[arg(long, env = "DEEPSTACK_API_KEY")]
    api_key: Option<String>,
    /// Detector request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Write an annotated snapshot of the accepted frame here (repeatable).
    #[arg(long = "snapshot", value_name = "PATH")]
    snapshots: Vec<PathBuf>,
    /// Also draw the ROI outline on snapshots.
    #[arg(long)]
    draw_roi: bool,
    /// Font for box captions (system fonts are tried when unset).
    #[arg(long, env = "TRIAGE_FONT", value_name = "PATH")]
    font: Option<PathBuf>,
    /// Move an accepted clip into this directory under its friendly name.
    #[arg(long, value_name = "DIR")]
    move_to: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = ui::Ui::new(
        ui::UiMode::parse(&args.ui),
        std::io::stderr().is_terminal(),
    );

    let settings = ScanSettings {
        frame_skip: args.frame_skip,
        min_confidence: args.min_confidence,
    };
    settings.validate()?;
    let classifier = Classifier::new(LabelSet::from_csv(&args.labels)?);
    let roi = args.roi.as_deref().map(Roi::parse).transpose()?;
    if args.draw_roi && roi.is_none() {
        return Err(anyhow!("--draw-roi needs --roi"));
    }

    let mut detector = {
        let _stage = ui.stage("Connect detector");
        let mut detector = backend_from_settings(&DetectorSettings {
            backend: args.detector.clone(),
            url: args.detector_url.clone(),
            api_key: args.api_key.clone(),
            timeout: Duration::from_secs(args.timeout_secs),
        })?;
        detector.warm_up().context("detector warm-up")?;
        detector
    };

    let clip = Clip::from_path(&args.path, &args.camera)?;
    let result = {
        let mut stage = ui.stage("Scan clip");
        let result = if args.path.to_string_lossy().starts_with("stub://") {
            // Synthetic streams have no directory to rebuild the path from.
            let source = FileSource::open(&args.path)?;
            clip.run_acceptance_with(source, &mut detector, &classifier, &settings, roi.as_ref())?
        } else {
            clip.run_acceptance(&mut detector, &classifier, &settings, roi.as_ref())?
        };
        stage.outcome(if result.is_accepted() {
            "accepted"
        } else {
            "rejected"
        });
        result
    };

    let stats = result.stats();
    let mut moved_to = None;
    if let (Some(frame), Some(response)) = (result.frame(), result.response()) {
        if let Some(dir) = &args.move_to {
            let _stage = ui.stage("Move clip");
            moved_to = Some(clip.relocate(dir)?);
        }
        if !args.snapshots.is_empty() {
            let _stage = ui.stage("Write snapshots");
            let font = LabelFont::discover(args.font.as_deref());
            clip.export_annotated(
                frame,
                response,
                &args.snapshots,
                args.draw_roi,
                roi.as_ref(),
                font.as_ref(),
            )?;
        }
    }

    let verdict = json!({
        "clip": clip.full_path(),
        "camera": clip.camera_name(),
        "camera_num": clip.camera_num(),
        "timestamp": clip.friendly_timestamp(),
        "friendly_name": clip.friendly_name(None),
        "accepted": result.is_accepted(),
        "unreadable": matches!(result, AcceptedResult::Rejected { unreadable: true, .. }),
        "frame_index": result.frame().map(|f| f.index()),
        "trigger": result.trigger(),
        "detections": result.response().map(|r| &r.detections),
        "frames_decoded": stats.frames_decoded,
        "frames_analysed": stats.frames_analysed,
        "snapshots": if result.is_accepted() { args.snapshots.clone() } else { Vec::new() },
        "moved_to": moved_to,
    });
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
