use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use tempfile::tempdir;

use clip_triage::config::{DetectorSettings, TriageConfig};
use clip_triage::{
    parse_identity, scan, AcceptedResult, BatchSummary, Classifier, ClipDisposition, Detection,
    DetectionResponse, DetectorBackend, FrameSource, LabelSet, MemorySource, Roi, ScanSettings,
    StubBackend, Triage, TriageError,
};

/// Frame `i` is painted a uniform grey of `i * 5`, so a backend can tell
/// which frame it was given from the JPEG alone.
fn numbered_frames(count: u64) -> Vec<RgbImage> {
    (1..=count)
        .map(|i| RgbImage::from_pixel(64, 48, Rgb([(i * 5) as u8; 3])))
        .collect()
}

/// Decodes the frame number back out of the JPEG and reports detections on
/// the requested frame only.
struct FrameReadingBackend {
    accept_on: Option<u64>,
    detections: Vec<Detection>,
    seen: Vec<u64>,
}

impl FrameReadingBackend {
    fn new(accept_on: Option<u64>, detections: Vec<Detection>) -> Self {
        Self {
            accept_on,
            detections,
            seen: Vec::new(),
        }
    }
}

impl DetectorBackend for FrameReadingBackend {
    fn name(&self) -> &str {
        "frame-reader"
    }

    fn detect(&mut self, jpeg: &[u8], min_confidence: f32) -> Result<DetectionResponse> {
        let img = image::load_from_memory(jpeg)?.to_rgb8();
        let centre = img.get_pixel(img.width() / 2, img.height() / 2)[0] as u64;
        let index = (centre + 2) / 5;
        self.seen.push(index);
        if self.accept_on == Some(index) {
            let detections = self
                .detections
                .iter()
                .filter(|d| d.confidence >= min_confidence)
                .cloned()
                .collect();
            return Ok(DetectionResponse::new(detections));
        }
        Ok(DetectionResponse::default())
    }
}

fn person_classifier() -> Classifier {
    Classifier::new(LabelSet::from_csv("person").unwrap())
}

#[test]
fn accepts_on_sixteenth_frame_with_full_response() {
    let detections = vec![
        Detection::new("car", 0.95, [0, 0, 20, 20]),
        Detection::new("person", 0.81, [30, 10, 50, 40]),
        Detection::new("person", 0.30, [1, 1, 2, 2]),
    ];
    let mut backend = FrameReadingBackend::new(Some(16), detections);
    let source = MemorySource::new("driveway", numbered_frames(40));

    let result = scan(
        source,
        &mut backend,
        &person_classifier(),
        &ScanSettings::default(),
        None,
    )
    .unwrap();

    assert_eq!(backend.seen, vec![1, 16]);
    let frame = result.frame().expect("accepted frame");
    assert_eq!(frame.index(), 16);
    assert_eq!((frame.width(), frame.height()), (64, 48));
    let response = result.response().expect("response");
    assert_eq!(response.len(), 2, "low-confidence detection filtered");
    assert_eq!(response.detections[0].label, "car");
    let trigger = result.trigger().expect("trigger");
    assert_eq!(trigger.label, "person");
    assert_eq!(result.stats().frames_analysed, 2);
    assert_eq!(result.stats().frames_decoded, 16);
}

#[test]
fn samples_every_fifteenth_frame_until_end_of_stream() {
    let mut backend = FrameReadingBackend::new(None, Vec::new());
    let source = MemorySource::new("yard", numbered_frames(50));

    let result = scan(
        source,
        &mut backend,
        &person_classifier(),
        &ScanSettings::default(),
        None,
    )
    .unwrap();

    assert_eq!(backend.seen, vec![1, 16, 31, 46]);
    assert!(!result.is_accepted());
    assert_eq!(result.stats().frames_decoded, 50);
    assert!(matches!(
        result,
        AcceptedResult::Rejected {
            unreadable: false,
            ..
        }
    ));
}

#[test]
fn detections_outside_roi_do_not_accept() {
    let detections = vec![Detection::new("person", 0.9, [40, 30, 60, 45])];
    let roi = Roi::parse("0,0;20,0;20,20;0,20").unwrap();

    let mut backend = FrameReadingBackend::new(Some(1), detections.clone());
    let outside = scan(
        MemorySource::new("a", numbered_frames(5)),
        &mut backend,
        &person_classifier(),
        &ScanSettings::default(),
        Some(&roi),
    )
    .unwrap();
    assert!(!outside.is_accepted());

    let touching = Roi::parse("0,0;40,0;40,30;0,30").unwrap();
    let mut backend = FrameReadingBackend::new(Some(1), detections);
    let corner = scan(
        MemorySource::new("b", numbered_frames(5)),
        &mut backend,
        &person_classifier(),
        &ScanSettings::default(),
        Some(&touching),
    )
    .unwrap();
    assert!(corner.is_accepted(), "shared corner counts as contact");
}

#[test]
fn camera_filenames_round_trip_through_friendly_names() {
    let cases = [
        ("Front Door", "01", (2021, 5, 11), (8, 27, 21)),
        ("back_yard", "12", (1999, 12, 31), (23, 59, 59)),
        ("Garage 2", "7", (2024, 2, 29), (0, 0, 0)),
    ];
    for (camera, num, (y, m, d), (hh, mm, ss)) in cases {
        let timestamp = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap();
        let filename = format!("{}_{}_{}", camera, num, timestamp.format("%Y%m%d%H%M%S"));

        let parsed = parse_identity(&filename, "Camera 1");
        assert!(!parsed.is_fallback(), "{filename}");
        let id = parsed.identity();
        assert_eq!(id.camera_name, camera);
        assert_eq!(id.camera_num, num);
        assert_eq!(id.timestamp, timestamp);
    }
}

#[test]
fn unrecognised_filename_uses_default_identity() {
    let clip = clip_triage::Clip::from_path(Path::new("/inbox/garbage.mp4"), "Camera 1").unwrap();
    assert!(clip.identity().is_fallback());
    assert_eq!(clip.camera_name(), "Camera 1");
    assert_eq!(clip.camera_num(), "01");
    assert_eq!(clip.friendly_name(None), "2000-01-01 01-00-00 (Camera 1).mp4");
}

fn triage_config(root: &Path, rejected: bool) -> TriageConfig {
    TriageConfig {
        inbox_dir: root.join("inbox"),
        accepted_dir: root.join("accepted"),
        rejected_dir: rejected.then(|| root.join("rejected")),
        images_dir: root.join("images"),
        image_outputs: vec!["{friendly}".to_string(), "latest.jpg".to_string()],
        extensions: vec!["mp4".to_string()],
        poll_interval: std::time::Duration::from_secs(10),
        labels: LabelSet::from_csv("person").unwrap(),
        default_camera: "Camera 1".to_string(),
        scan: ScanSettings::default(),
        roi: None,
        draw_roi: false,
        font_path: None,
        detector: DetectorSettings::default(),
    }
}

fn memory_opener(path: &Path) -> Result<Box<dyn FrameSource>> {
    let name = path.display().to_string();
    Ok(Box::new(MemorySource::new(name, numbered_frames(20))))
}

fn seed_inbox(cfg: &TriageConfig, names: &[&str]) {
    std::fs::create_dir_all(&cfg.inbox_dir).unwrap();
    for name in names {
        std::fs::write(cfg.inbox_dir.join(name), b"recording").unwrap();
    }
    std::fs::write(cfg.inbox_dir.join("notes.txt"), b"ignored").unwrap();
}

#[test]
fn triages_inbox_into_accepted_and_rejected() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(
        &cfg,
        &[
            "Front Door_01_20210511082721.mp4",
            "Porch_02_20220102030405.mp4",
            "garbage.mp4",
        ],
    );

    // Clips are visited in name order, two analysed frames each for a
    // 20-frame clip; only the first call finds someone.
    let detector = StubBackend::new().on_call(1, vec![Detection::new("person", 0.9, [5, 5, 30, 30])]);
    let mut triage = Triage::from_config(&cfg, detector).with_opener(memory_opener);
    triage.layout().ensure_dirs().unwrap();

    let summary = triage.process_inbox().unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            accepted: 1,
            rejected: 2,
            failed: 0
        }
    );
    assert_eq!(triage.detector().calls(), 5);

    let accepted = cfg.accepted_dir.join("2021-05-11 08-27-21 (Front Door).mp4");
    assert!(accepted.is_file());
    for snapshot in ["2021-05-11 08-27-21 (Front Door).jpg", "latest.jpg"] {
        let img = image::open(cfg.images_dir.join(snapshot)).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    let rejected_dir = cfg.rejected_dir.as_ref().unwrap();
    assert!(rejected_dir.join("2022-01-02 03-04-05 (Porch).mp4").is_file());
    assert!(rejected_dir.join("2000-01-01 01-00-00 (Camera 1).mp4").is_file());
    assert!(cfg.inbox_dir.join("notes.txt").is_file());
    assert!(!cfg.inbox_dir.join("garbage.mp4").exists());
}

#[test]
fn process_clip_reports_disposition() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), false);
    seed_inbox(&cfg, &["Porch_02_20220102030405.mp4", "Shed_04_20220102030405.mp4"]);

    let detector = StubBackend::new().on_call(2, vec![Detection::new("person", 0.7, [1, 1, 9, 9])]);
    let mut triage = Triage::from_config(&cfg, detector).with_opener(memory_opener);
    triage.layout().ensure_dirs().unwrap();

    let porch = cfg.inbox_dir.join("Porch_02_20220102030405.mp4");
    match triage.process_clip(&porch).unwrap() {
        ClipDisposition::Accepted {
            detection,
            frame_index,
            moved_to,
            snapshots,
        } => {
            assert_eq!(detection.label, "person");
            assert_eq!(frame_index, 16);
            assert_eq!(moved_to, cfg.accepted_dir.join("2022-01-02 03-04-05 (Porch).mp4"));
            assert_eq!(snapshots.len(), 2);
        }
        other => panic!("expected acceptance, got {other:?}"),
    }

    // No rejected directory: the clip stays where it is.
    let shed = cfg.inbox_dir.join("Shed_04_20220102030405.mp4");
    assert_eq!(
        triage.process_clip(&shed).unwrap(),
        ClipDisposition::Rejected {
            moved_to: None,
            unreadable: false
        }
    );
    assert!(shed.is_file());
}

#[test]
fn failing_clips_are_counted_and_left_in_place() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    // Both fall back to the same friendly name; the second gets a suffix.
    seed_inbox(&cfg, &["Attic_01_20230101000000.mp4", "garbage.mp4", "junk.mp4"]);

    let detector = StubBackend::new().failing_on(1);
    let mut triage = Triage::from_config(&cfg, detector).with_opener(memory_opener);
    triage.layout().ensure_dirs().unwrap();

    let summary = triage.process_inbox().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.total(), 3);

    assert!(cfg.inbox_dir.join("Attic_01_20230101000000.mp4").is_file());
    let rejected_dir = cfg.rejected_dir.as_ref().unwrap();
    assert!(rejected_dir.join("2000-01-01 01-00-00 (Camera 1).mp4").is_file());
    assert!(rejected_dir.join("2000-01-01 01-00-00 (Camera 1)-2.mp4").is_file());
}

#[test]
fn clips_sharing_a_friendly_name_all_leave_the_inbox() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(&cfg, &["aaa.mp4", "bbb.mp4"]);

    let person = || vec![Detection::new("person", 0.9, [5, 5, 30, 30])];
    let detector = StubBackend::new().on_call(1, person()).on_call(2, person());
    let mut triage = Triage::from_config(&cfg, detector).with_opener(memory_opener);
    triage.layout().ensure_dirs().unwrap();

    let first = triage.process_inbox().unwrap();
    assert_eq!(first.accepted, 2);
    assert_eq!(first.failed, 0);
    assert!(!cfg.inbox_dir.join("aaa.mp4").exists());
    assert!(!cfg.inbox_dir.join("bbb.mp4").exists());
    assert!(cfg.accepted_dir.join("2000-01-01 01-00-00 (Camera 1).mp4").is_file());
    assert!(cfg.accepted_dir.join("2000-01-01 01-00-00 (Camera 1)-2.mp4").is_file());
    assert!(cfg.images_dir.join("2000-01-01 01-00-00 (Camera 1)-2.jpg").is_file());

    // Nothing left to rescan.
    let second = triage.process_inbox().unwrap();
    assert_eq!(second.total(), 0);
    assert_eq!(triage.detector().calls(), 2);
}

#[test]
fn unopenable_clip_is_rejected_as_unreadable() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(&cfg, &["Gate_01_20230101000000.mp4"]);

    let opener = |_: &Path| -> Result<Box<dyn FrameSource>> { Err(anyhow::anyhow!("corrupt")) };
    let mut triage = Triage::from_config(&cfg, StubBackend::new()).with_opener(opener);
    triage.layout().ensure_dirs().unwrap();

    let path = cfg.inbox_dir.join("Gate_01_20230101000000.mp4");
    let disposition = triage.process_clip(&path).unwrap();
    assert!(matches!(
        disposition,
        ClipDisposition::Rejected {
            unreadable: true,
            moved_to: Some(_)
        }
    ));
    assert_eq!(triage.detector().calls(), 0);
}

#[test]
fn stop_flag_leaves_remaining_clips() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(&cfg, &["A_01_20230101000000.mp4", "B_01_20230101000000.mp4"]);

    let mut triage = Triage::from_config(&cfg, StubBackend::new()).with_opener(memory_opener);
    triage.layout().ensure_dirs().unwrap();

    let summary = triage.process_inbox_until(|| true).unwrap();
    assert_eq!(summary.total(), 0);
    assert!(cfg.inbox_dir.join("A_01_20230101000000.mp4").is_file());
}

#[test]
fn invalid_scan_settings_surface_as_config_errors() {
    let mut backend = StubBackend::new();
    let settings = ScanSettings {
        frame_skip: 0,
        min_confidence: 0.5,
    };
    let err = scan(
        MemorySource::new("x", numbered_frames(3)),
        &mut backend,
        &person_classifier(),
        &settings,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, TriageError::Config(_)));
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
#[test]
fn missing_decoder_fails_clip_and_keeps_it_in_inbox() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(&cfg, &["Front Door_01_20210511082721.mp4"]);

    let detector = StubBackend::new().on_call(1, vec![Detection::new("person", 0.9, [5, 5, 30, 30])]);
    let mut triage = Triage::from_config(&cfg, detector);
    triage.layout().ensure_dirs().unwrap();

    let path = cfg.inbox_dir.join("Front Door_01_20210511082721.mp4");
    assert!(matches!(
        triage.process_clip(&path),
        Err(TriageError::DecoderUnavailable { .. })
    ));

    let summary = triage.process_inbox().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rejected, 0);
    assert_eq!(triage.detector().calls(), 0);
    assert!(path.is_file());
    let rejected = std::fs::read_dir(cfg.rejected_dir.as_ref().unwrap()).unwrap();
    assert_eq!(rejected.count(), 0);
}

#[cfg(feature = "ingest-file-ffmpeg")]
#[test]
fn undecodable_file_is_rejected_as_unreadable() {
    let root = tempdir().unwrap();
    let cfg = triage_config(root.path(), true);
    seed_inbox(&cfg, &["Front Door_01_20210511082721.mp4"]);

    let mut triage = Triage::from_config(&cfg, StubBackend::new());
    triage.layout().ensure_dirs().unwrap();

    let path = cfg.inbox_dir.join("Front Door_01_20210511082721.mp4");
    assert!(matches!(
        triage.process_clip(&path).unwrap(),
        ClipDisposition::Rejected {
            unreadable: true,
            moved_to: Some(_)
        }
    ));
    assert_eq!(triage.detector().calls(), 0);
}
