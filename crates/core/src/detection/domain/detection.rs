/// Axis-aligned box in pixel coordinates: top-left corner plus extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union; 0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Same center, both sides multiplied by `factor`.
    pub fn scaled_about_center(&self, factor: f64) -> BoundingBox {
        let (cx, cy) = self.center();
        let w = self.width * factor;
        let h = self.height * factor;
        BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }
}

/// One detected face.
///
/// Produced by the decoder and never mutated afterwards; later stages
/// build new values instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Cell confidence in `[0, 1]`, as emitted by the network.
    pub score: f64,
    pub bbox: BoundingBox,
    /// Facial keypoints `(x, y)` in the same coordinate space as `bbox`.
    pub landmarks: Option<Vec<(f64, f64)>>,
}

/// Detections for one frame, in suppression survival order (descending score).
pub type DetectionSet = Vec<Detection>;
