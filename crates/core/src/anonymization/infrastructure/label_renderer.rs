use ab_glyph::{Font, FontRef, InvalidFont, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::shared::frame::Frame;

pub const LABEL_COLOR: [u8; 3] = [128, 255, 128];

/// Label glyph height in pixels.
pub const LABEL_FONT_SIZE: f32 = 20.0;

const FONT_DATA: &[u8] = include_bytes!("../../../assets/DejaVuSans.ttf");

/// Margin around the measured text, for anti-aliased edges.
const PAD: i64 = 2;

/// Label for the `index`-th detection (zero-based), e.g. `"3: 0.87"`.
pub fn detection_label(index: usize, score: f64) -> String {
    format!("{}: {:.2}", index + 1, score)
}

/// Draws detection labels with the embedded DejaVu Sans font.
pub struct LabelRenderer {
    font: FontRef<'static>,
    scale: PxScale,
}

impl LabelRenderer {
    pub fn new() -> Result<Self, InvalidFont> {
        Ok(Self {
            font: FontRef::try_from_slice(FONT_DATA)?,
            scale: PxScale::from(LABEL_FONT_SIZE),
        })
    }

    /// Draws `text` with its baseline at `baseline_y`, starting at `x`.
    ///
    /// Only the text's bounding box is copied into an image buffer, drawn
    /// on and copied back. Parts outside the frame are clipped.
    pub fn draw(&self, frame: &mut Frame, text: &str, x: i64, baseline_y: i64, color: [u8; 3]) {
        let scaled = self.font.as_scaled(self.scale);
        let top = baseline_y - scaled.ascent().ceil() as i64;
        let height = (scaled.ascent() - scaled.descent()).ceil() as i64;
        let width: f32 = text
            .chars()
            .map(|c| scaled.h_advance(self.font.glyph_id(c)))
            .sum();

        let (fw, fh) = (frame.width() as i64, frame.height() as i64);
        let x0 = (x - PAD).max(0);
        let y0 = (top - PAD).max(0);
        let x1 = (x + width.ceil() as i64 + PAD).min(fw);
        let y1 = (top + height + PAD).min(fh);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let (cw, ch) = ((x1 - x0) as u32, (y1 - y0) as u32);
        let mut canvas = RgbImage::new(cw, ch);
        for cy in 0..ch {
            for cx in 0..cw {
                let p = frame.pixel(x0 as u32 + cx, y0 as u32 + cy);
                canvas.put_pixel(cx, cy, Rgb(p));
            }
        }

        draw_text_mut(
            &mut canvas,
            Rgb(color),
            (x - x0) as i32,
            (top - y0) as i32,
            self.scale,
            &self.font,
            text,
        );

        for (cx, cy, p) in canvas.enumerate_pixels() {
            frame.set_pixel(x0 as u32 + cx, y0 as u32 + cy, p.0);
        }
    }
}
