//! Decoded frames.
//!
//! A `Frame` is one decoded RGB raster plus its 1-based position in the
//! stream. Frames are owned by the scan loop and dropped as soon as they are
//! passed over; only the frame that triggers acceptance survives the scan.

use std::io::Cursor;

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::TriageError;

/// JPEG quality used for detector uploads.
pub const DETECTOR_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Debug)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Wrap a packed RGB24 buffer as produced by a decoder.
    pub fn from_rgb(index: u64, pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", width, height))?;
        Ok(Self { index, image })
    }

    /// 1-based position of this frame in its stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Encode as JPEG for the detection capability.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, TriageError> {
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, DETECTOR_JPEG_QUALITY)
            .encode_image(&self.image)
            .map_err(|e| TriageError::encode(format!("frame {}", self.index), e))?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_checks_buffer_length() {
        assert!(Frame::from_rgb(1, vec![0u8; 12], 2, 2).is_ok());
        assert!(Frame::from_rgb(1, vec![0u8; 11], 2, 2).is_err());
    }

    #[test]
    fn encodes_decodable_jpeg() {
        let frame = Frame::new(7, RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 10])));
        let jpeg = frame.encode_jpeg().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
        assert_eq!(frame.index(), 7);
    }
}
