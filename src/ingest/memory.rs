use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

use super::FrameSource;
use crate::frame::Frame;

/// In-memory frame sequence. Indices start at 1.
pub struct MemorySource {
    name: String,
    frames: VecDeque<RgbImage>,
    next_index: u64,
    released: bool,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<RgbImage>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            next_index: 1,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(image) = self.frames.pop_front() else {
            return Ok(None);
        };
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.released = true;
        self.frames.clear();
    }
}
