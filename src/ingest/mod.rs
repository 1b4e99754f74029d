//! Frame sources.
//!
//! This module provides the video-stream seam of the scan loop:
//! - `FrameSource`: a sequential stream of decoded frames
//! - `StreamGuard`: scoped ownership that releases a stream exactly once
//! - `FileSource`: local clips (FFmpeg, feature: ingest-file-ffmpeg) and
//!   synthetic `stub://` streams
//! - `MemorySource`: an in-memory frame sequence
//!
//! Sources decode strictly in order. There is no seeking; skipping frames
//! means decoding and discarding them.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use anyhow::Result;

use crate::error::TriageError;
use crate::frame::Frame;

/// Whether `FileSource` can decode real recordings in this build.
pub const fn decodes_files() -> bool {
    cfg!(feature = "ingest-file-ffmpeg")
}

/// Sort a failed open into a setup problem or an unreadable clip.
///
/// A missing decoder is returned as `Err` and must be propagated; anything
/// else comes back as `Ok` so the caller can reject the clip as unreadable.
pub(crate) fn classify_open_failure(e: anyhow::Error) -> Result<anyhow::Error, TriageError> {
    match e.downcast::<TriageError>() {
        Ok(err @ TriageError::DecoderUnavailable { .. }) => Err(err),
        Ok(other) => Ok(other.into()),
        Err(e) => Ok(e),
    }
}

/// Sequential stream of decoded frames.
pub trait FrameSource {
    /// Human-readable name for log lines.
    fn name(&self) -> &str;

    /// Decode the next frame. `Ok(None)` marks end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Called once by `StreamGuard`.
    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Owns a stream for the duration of a scan.
///
/// The stream is released exactly once: either by an explicit `release()`
/// or when the guard is dropped, whichever happens first. Early returns and
/// `?` propagation inside a scan therefore cannot leak the handle.
pub struct StreamGuard<S: FrameSource> {
    source: S,
    released: bool,
}

impl<S: FrameSource> StreamGuard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Next frame, or `None` once released or exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        self.source.next_frame()
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<S: FrameSource> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSource {
        releases: Rc<Cell<u32>>,
    }

    impl FrameSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }

        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    #[test]
    fn guard_releases_once_on_drop() {
        let releases = Rc::new(Cell::new(0));
        {
            let _guard = StreamGuard::new(CountingSource {
                releases: releases.clone(),
            });
        }
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn explicit_release_is_not_repeated_on_drop() {
        let releases = Rc::new(Cell::new(0));
        {
            let mut guard = StreamGuard::new(CountingSource {
                releases: releases.clone(),
            });
            guard.release();
            guard.release();
            assert!(guard.is_released());
            assert!(guard.next_frame().unwrap().is_none());
        }
        assert_eq!(releases.get(), 1);
    }
}
