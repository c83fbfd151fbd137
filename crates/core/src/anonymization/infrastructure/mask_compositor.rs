use std::cell::RefCell;
use std::cmp::Ordering;

use crate::anonymization::domain::anonymization_config::{AnonymizationConfig, MaskShape, ReplaceMode};
use crate::anonymization::domain::anonymization_region::AnonymizationRegion;
use crate::anonymization::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::detection::Detection;
use crate::shared::frame::{Frame, CHANNELS};

use super::box_filter::{self, RoiRect};
use super::label_renderer::{detection_label, LabelRenderer, LABEL_COLOR};

pub const DEFAULT_FILL_COLOR: [u8; 3] = [0, 0, 0];

/// Distance between a label's baseline and the region's top edge.
const LABEL_OFFSET: i64 = 20;

/// CPU compositor applying solid fill or region-local box blur.
///
/// Every blur reads the unfiltered frame. Where regions overlap, the pixel
/// takes the blur with the largest kernel, so the result does not depend
/// on detection order. Labels are drawn after every region has been filtered.
pub struct CpuMaskCompositor {
    replace_mode: ReplaceMode,
    shape: MaskShape,
    mask_scale: f64,
    labels: Option<LabelRenderer>,
    fill_color: [u8; 3],
    source: RefCell<Vec<u8>>,
    roi_buf: RefCell<Vec<u8>>,
    blur_temp: RefCell<Vec<u32>>,
}

impl CpuMaskCompositor {
    pub fn new(config: &AnonymizationConfig) -> Self {
        Self {
            replace_mode: config.replace_mode,
            shape: config.shape,
            mask_scale: config.mask_scale,
            labels: config.annotate.then(load_labels).flatten(),
            fill_color: DEFAULT_FILL_COLOR,
            source: RefCell::new(Vec::new()),
            roi_buf: RefCell::new(Vec::new()),
            blur_temp: RefCell::new(Vec::new()),
        }
    }

    pub fn with_fill_color(mut self, color: [u8; 3]) -> Self {
        self.fill_color = color;
        self
    }

    fn fill(&self, frame: &mut Frame, region: &AnonymizationRegion) {
        let fw = frame.width() as usize;
        let rect = roi_rect(region);
        let mask = region.mask(self.shape);
        let data = frame.data_mut();
        for row in 0..rect.h {
            for col in 0..rect.w {
                if mask(col, row) {
                    let o = ((rect.y + row) * fw + rect.x + col) * CHANNELS;
                    data[o..o + CHANNELS].copy_from_slice(&self.fill_color);
                }
            }
        }
    }

    fn blur_all(&self, frame: &mut Frame, regions: &[&AnonymizationRegion]) {
        let fw = frame.width() as usize;
        let mut ordered: Vec<(&AnonymizationRegion, (usize, usize))> =
            regions.iter().map(|r| (*r, blur_kernel(r))).collect();
        // weakest first: later writes win
        ordered.sort_by(|(ra, ka), (rb, kb)| {
            (ka.0 * ka.1)
                .cmp(&(kb.0 * kb.1))
                .then_with(|| geometry_order(ra, rb))
        });

        let mut source = self.source.borrow_mut();
        source.clear();
        source.extend_from_slice(frame.data());
        let mut roi = self.roi_buf.borrow_mut();
        let mut temp = self.blur_temp.borrow_mut();

        let data = frame.data_mut();
        for (region, kernel) in ordered {
            let rect = roi_rect(region);
            box_filter::extract_roi(&source, fw, CHANNELS, rect, &mut roi);
            box_filter::box_blur(&mut roi, rect.w, rect.h, CHANNELS, kernel, &mut temp);
            box_filter::write_roi_back_masked(data, &roi, fw, CHANNELS, rect, region.mask(self.shape));
        }
    }
}

impl FrameAnonymizer for CpuMaskCompositor {
    fn anonymize(&self, frame: &mut Frame, detections: &[Detection]) {
        if detections.is_empty() {
            return;
        }
        let frame_size = frame.size();
        let regions: Vec<(usize, &Detection, AnonymizationRegion)> = detections
            .iter()
            .enumerate()
            .filter_map(|(i, d)| {
                AnonymizationRegion::from_detection(d, self.mask_scale, frame_size).map(|r| (i, d, r))
            })
            .collect();

        match self.replace_mode {
            ReplaceMode::Solid => {
                for (_, _, region) in &regions {
                    self.fill(frame, region);
                }
            }
            ReplaceMode::Blur => {
                let targets: Vec<&AnonymizationRegion> = regions.iter().map(|(_, _, r)| r).collect();
                self.blur_all(frame, &targets);
            }
            ReplaceMode::None => {}
        }

        if let Some(labels) = &self.labels {
            for (i, detection, region) in &regions {
                let full = region.full_box();
                labels.draw(
                    frame,
                    &detection_label(*i, detection.score),
                    full.x.round() as i64,
                    full.y.round() as i64 - LABEL_OFFSET,
                    LABEL_COLOR,
                );
            }
        }
    }
}

fn load_labels() -> Option<LabelRenderer> {
    match LabelRenderer::new() {
        Ok(renderer) => Some(renderer),
        Err(e) => {
            log::warn!("Label font failed to load ({e}), annotations disabled");
            None
        }
    }
}

fn roi_rect(region: &AnonymizationRegion) -> RoiRect {
    RoiRect {
        x: region.x as usize,
        y: region.y as usize,
        w: region.width as usize,
        h: region.height as usize,
    }
}

/// Kernel sized from the full scaled box, so a face mostly outside the
/// frame is blurred as hard as a visible one of the same size. Capped at
/// the visible rectangle.
fn blur_kernel(region: &AnonymizationRegion) -> (usize, usize) {
    let full = region.full_box();
    let axis = |full_side: f64, visible: u32| {
        let visible = visible as usize;
        box_filter::kernel_for(full_side.round() as usize)
            .min(visible)
            .max(box_filter::kernel_for(visible))
    };
    (axis(full.width, region.width), axis(full.height, region.height))
}

/// Total order on region geometry, used to break kernel ties.
fn geometry_order(a: &AnonymizationRegion, b: &AnonymizationRegion) -> Ordering {
    let (fa, fb) = (a.full_box(), b.full_box());
    (a.x, a.y, a.width, a.height)
        .cmp(&(b.x, b.y, b.width, b.height))
        .then_with(|| fa.x.total_cmp(&fb.x))
        .then_with(|| fa.y.total_cmp(&fb.y))
        .then_with(|| fa.width.total_cmp(&fb.width))
        .then_with(|| fa.height.total_cmp(&fb.height))
}
