use ab_glyph::{FontArc, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use schema::{DetectionRecord, DetectionResult};

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const LABEL_FONT_SIZE: f32 = 14.0;
const BOX_THICKNESS: i64 = 2;
const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

// Nothing this far out can land on a canvas; keeps rect arithmetic in i32.
const COORD_LIMIT: f64 = (1 << 20) as f64;

/// Draws detection boxes and label tags onto a copy of an image.
///
/// Boxes and tags are placed exactly where the detections say, even when
/// that is partly or wholly off-canvas; pixels outside the image are simply
/// not drawn.
pub struct Overlay {
    font: FontArc,
    scale: PxScale,
}

impl Overlay {
    pub fn new() -> anyhow::Result<Self> {
        let font = FontArc::try_from_slice(FONT_DATA).context("Embedded label font is invalid")?;

        Ok(Self {
            font,
            scale: PxScale::from(LABEL_FONT_SIZE),
        })
    }

    pub fn draw(&self, image: &RgbImage, result: &DetectionResult) -> RgbImage {
        let mut canvas = image.clone();
        for detection in &result.detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    /// `"{class_name} {confidence:.2}"`
    pub fn label(detection: &DetectionRecord) -> String {
        format!("{} {:.2}", detection.class_name, detection.confidence)
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &DetectionRecord) {
        let bbox = &detection.bbox;
        let x1 = to_px(bbox.x1);
        let y1 = to_px(bbox.y1);
        let x2 = to_px(bbox.x2);
        let y2 = to_px(bbox.y2);

        // Corners are inclusive; the outline grows inwards.
        for t in 0..BOX_THICKNESS {
            let width = x2 - x1 + 1 - 2 * t;
            let height = y2 - y1 + 1 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at((x1 + t) as i32, (y1 + t) as i32)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }

        let label = Self::label(detection);
        let (text_width, text_height) = text_size(self.scale, &self.font, &label);
        if text_width == 0 || text_height == 0 {
            return;
        }

        let tag_x = x1 as i32;
        let tag_y = (y1 - i64::from(text_height)) as i32;

        draw_filled_rect_mut(
            canvas,
            Rect::at(tag_x, tag_y).of_size(text_width, text_height),
            BOX_COLOR,
        );
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            tag_x,
            tag_y,
            self.scale,
            &self.font,
            &label,
        );
    }
}

fn to_px(value: f64) -> i64 {
    value.round().clamp(-COORD_LIMIT, COORD_LIMIT) as i64
}
