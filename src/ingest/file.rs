//! Local clip frame source.
//!
//! `FileSource` reads frames from a recording on local disk. Paths of the
//! form `stub://<frames>` open a synthetic stream of `<frames>` gradient
//! frames instead, which is how dry runs and tests exercise the pipeline
//! without a decoder.
//!
//! The file source MUST NOT fetch remote URLs.

use std::path::Path;

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
#[cfg(not(feature = "ingest-file-ffmpeg"))]
use crate::error::TriageError;
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

/// Local clip frame source.
pub struct FileSource {
    name: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
    Released,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let display = path.to_string_lossy().into_owned();
        if !is_local_file_path(&display) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): {}",
                display
            ));
        }
        if let Some(count) = display.strip_prefix("stub://") {
            let frames: u64 = count
                .parse()
                .map_err(|_| anyhow!("stub source needs a frame count, got '{}'", count))?;
            return Ok(Self {
                name: display.clone(),
                backend: FileBackend::Synthetic(SyntheticFileSource::new(frames)),
            });
        }
        if !path.is_file() {
            return Err(anyhow!("no such clip: {}", display));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                name: display,
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(TriageError::DecoderUnavailable {
                path: path.to_path_buf(),
                reason: "built without the ingest-file-ffmpeg feature".to_string(),
            }
            .into())
        }
    }

    /// Frames decoded so far.
    pub fn frames_decoded(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frames_decoded(),
            FileBackend::Released => 0,
        }
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
            FileBackend::Released => Ok(None),
        }
    }

    fn release(&mut self) {
        // Dropping the backend closes the demuxer and decoder.
        self.backend = FileBackend::Released;
        log::debug!("FileSource: released {}", self.name);
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for dry runs and tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    total_frames: u64,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.frame_count >= self.total_frames {
            return None;
        }
        self.frame_count += 1;
        let shift = (self.frame_count % 256) as u32;
        let image = RgbImage::from_fn(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, |x, y| {
            image::Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                (shift % 256) as u8,
            ])
        });
        Some(Frame::new(self.frame_count, image))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
