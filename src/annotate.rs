//! Snapshot rendering: detection boxes, their labels and the ROI outline.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionResponse};
use crate::geometry::Roi;

pub const LINE_THICKNESS: i64 = 2;
pub const ROI_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);
const TEXT_COLOUR: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_PADDING: i32 = 2;

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 64, 64]),
    Rgb([64, 220, 64]),
    Rgb([255, 200, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 220, 220]),
    Rgb([255, 128, 0]),
];

/// Looked up in order when no font is configured.
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used for `<label> <confidence>%` captions.
pub struct LabelFont {
    font: FontVec,
    path: PathBuf,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("parse font {}", path.display()))?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    /// `configured` if it loads, else the first usable system font.
    /// `None` means boxes are drawn without captions.
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(font) => return Some(font),
                Err(e) => log::warn!("caption font unusable, trying system fonts: {:#}", e),
            }
        }
        let found = SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| Self::load(p).ok());
        match &found {
            Some(font) => log::debug!("captions use {}", font.path.display()),
            None => log::debug!("no caption font found, snapshots carry boxes only"),
        }
        found
    }
}

/// Colour for a label. Stable across runs so the same class always looks
/// the same in exported snapshots.
pub fn label_colour(label: &str) -> Rgb<u8> {
    let hash = label
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}

/// Caption drawn next to a box.
pub fn caption(detection: &Detection) -> String {
    format!("{} {:.1}%", detection.label, detection.confidence_percent())
}

/// Copy of `image` with every detection in `response` outlined, captioned
/// when a font is given.
pub fn annotate(
    image: &RgbImage,
    response: &DetectionResponse,
    font: Option<&LabelFont>,
) -> RgbImage {
    let mut out = image.clone();
    for detection in &response.detections {
        draw_detection(&mut out, detection);
    }
    if let Some(font) = font {
        for detection in &response.detections {
            draw_caption(&mut out, detection, font);
        }
    }
    out
}

/// Outline the ROI polygon in place.
pub fn draw_roi(image: &mut RgbImage, roi: &Roi) {
    for (a, b) in roi.edges() {
        let (ax, ay) = (a.x as f32, a.y as f32);
        let (bx, by) = (b.x as f32, b.y as f32);
        for o in 0..LINE_THICKNESS {
            let o = o as f32;
            draw_line_segment_mut(image, (ax + o, ay), (bx + o, by), ROI_COLOUR);
            draw_line_segment_mut(image, (ax, ay + o), (bx, by + o), ROI_COLOUR);
        }
    }
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let colour = label_colour(&detection.label);
    let (x0, y0) = (detection.x_min as i64, detection.y_min as i64);
    let (x1, y1) = (detection.x_max as i64, detection.y_max as i64);
    for t in 0..LINE_THICKNESS {
        match inset_rect(x0 + t, y0 + t, x1 - t, y1 - t) {
            Some(rect) => draw_hollow_rect_mut(image, rect, colour),
            None => break,
        }
    }
}

/// Inclusive corners to a `Rect`; `None` when empty or out of `i32` range.
fn inset_rect(left: i64, top: i64, right: i64, bottom: i64) -> Option<Rect> {
    if left > right || top > bottom {
        return None;
    }
    let width = u32::try_from(right - left + 1).ok()?;
    let height = u32::try_from(bottom - top + 1).ok()?;
    Some(Rect::at(i32::try_from(left).ok()?, i32::try_from(top).ok()?).of_size(width, height))
}

fn draw_caption(image: &mut RgbImage, detection: &Detection, font: &LabelFont) {
    let text = caption(detection);
    let scale = PxScale::from((image.height() as f32 / 40.0).max(12.0));
    let (text_w, text_h) = text_size(scale, &font.font, &text);
    if text_w == 0 || text_h == 0 {
        return;
    }
    let pad = LABEL_PADDING as u32;
    let (box_w, box_h) = (text_w + 2 * pad, text_h + 2 * pad);

    let x = detection.x_min.max(0);
    // Above the box when it fits, else just inside its top edge.
    let y = if detection.y_min >= box_h as i32 {
        detection.y_min - box_h as i32
    } else {
        detection.y_min.max(0)
    };
    draw_filled_rect_mut(
        image,
        Rect::at(x, y).of_size(box_w, box_h),
        label_colour(&detection.label),
    );
    draw_text_mut(
        image,
        TEXT_COLOUR,
        x + LABEL_PADDING,
        y + LABEL_PADDING,
        scale,
        &font.font,
        &text,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn annotate_outlines_every_box_and_leaves_source_untouched() {
        let source = RgbImage::from_pixel(64, 64, BLACK);
        let response = DetectionResponse::new(vec![
            Detection::new("person", 0.9, [4, 4, 20, 20]),
            Detection::new("car", 0.6, [30, 30, 60, 50]),
        ]);
        let out = annotate(&source, &response, None);

        assert_eq!(*out.get_pixel(4, 10), label_colour("person"));
        assert_eq!(*out.get_pixel(5, 10), label_colour("person"));
        assert_eq!(*out.get_pixel(12, 12), BLACK);
        assert_eq!(*out.get_pixel(45, 50), label_colour("car"));
        assert_eq!(*source.get_pixel(4, 10), BLACK);
    }

    #[test]
    fn boxes_beyond_the_frame_are_clipped() {
        let source = RgbImage::from_pixel(16, 16, BLACK);
        let response = DetectionResponse::new(vec![Detection::new("dog", 0.9, [-5, -5, 40, 8])]);
        let out = annotate(&source, &response, None);
        assert_eq!(*out.get_pixel(3, 8), label_colour("dog"));
    }

    #[test]
    fn degenerate_boxes_draw_what_they_can() {
        let source = RgbImage::from_pixel(16, 16, BLACK);
        let response = DetectionResponse::new(vec![
            Detection::new("cat", 0.9, [5, 5, 5, 5]),
            Detection::new("cat", 0.9, [10, 10, 2, 2]),
        ]);
        let out = annotate(&source, &response, None);
        assert_eq!(*out.get_pixel(5, 5), label_colour("cat"));
        assert_eq!(*out.get_pixel(6, 6), BLACK);
        assert_eq!(*out.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn roi_outline_is_drawn_on_edges() {
        let mut img = RgbImage::from_pixel(32, 32, BLACK);
        let roi = Roi::from_pairs(&[[2.0, 2.0], [28.0, 2.0], [28.0, 28.0], [2.0, 28.0]]).unwrap();
        draw_roi(&mut img, &roi);
        assert_eq!(*img.get_pixel(15, 2), ROI_COLOUR);
        assert_eq!(*img.get_pixel(15, 3), ROI_COLOUR);
        assert_eq!(*img.get_pixel(28, 15), ROI_COLOUR);
        assert_eq!(*img.get_pixel(15, 15), BLACK);
    }

    #[test]
    fn caption_carries_label_and_percentage() {
        assert_eq!(caption(&Detection::new("person", 0.875, [0, 0, 1, 1])), "person 87.5%");
    }

    #[test]
    fn captions_sit_above_the_box_when_a_font_is_available() {
        let Some(font) = LabelFont::discover(None) else {
            return;
        };
        let source = RgbImage::from_pixel(200, 200, BLACK);
        let detection = Detection::new("person", 0.9, [20, 80, 120, 180]);
        let response = DetectionResponse::new(vec![detection]);

        let plain = annotate(&source, &response, None);
        let captioned = annotate(&source, &response, Some(&font));

        assert_eq!(*plain.get_pixel(20, 79), BLACK);
        assert_eq!(*captioned.get_pixel(20, 79), label_colour("person"));

        // Glyphs are inked over the caption background.
        let scale = PxScale::from(12.0);
        let (text_w, text_h) = text_size(scale, &font.font, "person 90.0%");
        let top = 80 - (text_h + 2 * LABEL_PADDING as u32);
        let inked = (top..80)
            .flat_map(|y| (20..20 + text_w).map(move |x| (x, y)))
            .filter(|&(x, y)| *captioned.get_pixel(x, y) != label_colour("person"))
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn unusable_font_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();
        assert!(LabelFont::load(file.path()).is_err());
        assert!(LabelFont::load(Path::new("/definitely/missing/font.ttf")).is_err());
    }

    #[test]
    fn label_colour_is_stable() {
        assert_eq!(label_colour("person"), label_colour("person"));
    }
}
