use crate::detection::domain::detection::{BoundingBox, Detection};

use super::anonymization_config::MaskShape;

/// Area a filter is applied to, derived from one detection.
///
/// Carries both the pixel rectangle visible in the frame (`x`, `y`,
/// `width`, `height`) and the full scaled geometry, so ellipses near a
/// frame edge are cut off by the edge instead of shrinking to fit.
#[derive(Clone, Debug, PartialEq)]
pub struct AnonymizationRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    full: BoundingBox,
}

impl AnonymizationRegion {
    /// Scales `detection`'s box about its center by `mask_scale` and clips the
    /// pixel rectangle to `frame_size`.
    ///
    /// The pixel rectangle rounds outward, so every pixel whose center lies
    /// inside the scaled box is part of it. Returns `None` when nothing of
    /// the region lands inside the frame.
    pub fn from_detection(
        detection: &Detection,
        mask_scale: f64,
        frame_size: (u32, u32),
    ) -> Option<Self> {
        let full = detection.bbox.scaled_about_center(mask_scale);
        let (fw, fh) = (frame_size.0 as f64, frame_size.1 as f64);

        let x1 = full.x.floor().clamp(0.0, fw);
        let y1 = full.y.floor().clamp(0.0, fh);
        let x2 = full.right().ceil().clamp(0.0, fw);
        let y2 = full.bottom().ceil().clamp(0.0, fh);
        if !(x2 > x1 && y2 > y1) {
            return None;
        }

        Some(Self {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            full,
        })
    }

    /// The unclipped scaled box, in frame coordinates.
    pub fn full_box(&self) -> &BoundingBox {
        &self.full
    }

    /// Ellipse center relative to the clipped rectangle's origin.
    ///
    /// Off-screen parts shift the center outside the rectangle rather
    /// than pulling it inward.
    pub fn ellipse_center_in_roi(&self) -> (f64, f64) {
        let (cx, cy) = self.full.center();
        (cx - self.x as f64, cy - self.y as f64)
    }

    pub fn ellipse_axes(&self) -> (f64, f64) {
        (self.full.width / 2.0, self.full.height / 2.0)
    }

    /// Whether the pixel at `(px, py)` (frame coordinates) is covered,
    /// judged at the pixel center.
    pub fn contains(&self, px: u32, py: u32, shape: MaskShape) -> bool {
        if px < self.x || py < self.y || px >= self.x + self.width || py >= self.y + self.height {
            return false;
        }
        self.mask(shape)((px - self.x) as usize, (py - self.y) as usize)
    }

    /// Coverage test in coordinates local to the clipped rectangle.
    ///
    /// Ellipses are judged at pixel centers. The pixel holding the ellipse
    /// center is always covered, so a sub-pixel region still masks something.
    pub fn mask(&self, shape: MaskShape) -> impl Fn(usize, usize) -> bool {
        let (cx, cy) = self.ellipse_center_in_roi();
        let (a, b) = self.ellipse_axes();
        let center_pixel = (cx.floor(), cy.floor());
        move |col, row| match shape {
            MaskShape::Box => true,
            MaskShape::Ellipse => {
                (col as f64, row as f64) == center_pixel
                    || inside_ellipse(col as f64 + 0.5 - cx, row as f64 + 0.5 - cy, a, b)
            }
        }
    }
}

/// `dx`, `dy` are offsets from the ellipse center.
pub fn inside_ellipse(dx: f64, dy: f64, a: f64, b: f64) -> bool {
    if a <= 0.0 || b <= 0.0 {
        return false;
    }
    (dx / a).powi(2) + (dy / b).powi(2) <= 1.0
}
