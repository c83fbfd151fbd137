//! Heatmap decoding and greedy non-maximum suppression.
//!
//! Pure functions of the tensors and the threshold: no I/O, no state.

use super::detection::{BoundingBox, Detection};
use super::inference_adapter::InferenceTensors;
use crate::shared::error::AnonymizeError;

/// Boxes overlapping an accepted box by more than this IoU are dropped.
pub const NMS_IOU_THRESHOLD: f64 = 0.3;

/// Converts raw tensors into scored boxes in inference-resolution pixels.
///
/// Every cell with confidence `>= threshold` becomes a candidate:
/// - `height = exp(size[0]) * stride`, `width = exp(size[1]) * stride`
/// - center `((col + offset_x + 0.5) * stride, (row + offset_y + 0.5) * stride)`
/// - landmark `k` at `(lm[2k+1] * width + x, lm[2k] * height + y)`
///
/// Candidates then go through [`non_max_suppression`]. Cells are scanned
/// row-major, so equal scores keep discovery order.
pub fn decode(tensors: &InferenceTensors, threshold: f64) -> Result<Vec<Detection>, AnonymizeError> {
    validate_layout(tensors)?;

    let stride = tensors.stride as f64;
    let (rows, cols) = tensors.heatmap.dim();
    let mut candidates = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            let score = tensors.heatmap[[row, col]] as f64;
            if score.is_nan() || score < threshold {
                continue;
            }

            let height = (tensors.size_map[[0, row, col]] as f64).exp() * stride;
            let width = (tensors.size_map[[1, row, col]] as f64).exp() * stride;
            let cy = (row as f64 + tensors.offset_map[[0, row, col]] as f64 + 0.5) * stride;
            let cx = (col as f64 + tensors.offset_map[[1, row, col]] as f64 + 0.5) * stride;
            let bbox = BoundingBox::new(cx - width / 2.0, cy - height / 2.0, width, height);

            let landmarks = tensors.landmark_map.as_ref().map(|lm| {
                (0..lm.dim().0 / 2)
                    .map(|k| {
                        let ly = lm[[2 * k, row, col]] as f64;
                        let lx = lm[[2 * k + 1, row, col]] as f64;
                        (lx * width + bbox.x, ly * height + bbox.y)
                    })
                    .collect()
            });

            candidates.push(Detection {
                score,
                bbox,
                landmarks,
            });
        }
    }

    Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
}

/// Greedy NMS: highest score first, dropping later boxes whose IoU with an
/// accepted box exceeds `iou_threshold`.
///
/// The sort is stable, so ties are resolved by input order. Landmarks travel
/// with their box.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn validate_layout(t: &InferenceTensors) -> Result<(), AnonymizeError> {
    let violation = |msg: String| Err(AnonymizeError::DecodeInvariantViolation(msg));
    let (rows, cols) = t.heatmap.dim();

    if t.stride == 0 {
        return violation("stride must be non-zero".into());
    }
    if t.size_map.dim() != (2, rows, cols) {
        return violation(format!(
            "size map {:?} does not match heatmap ({rows}, {cols})",
            t.size_map.dim()
        ));
    }
    if t.offset_map.dim() != (2, rows, cols) {
        return violation(format!(
            "offset map {:?} does not match heatmap ({rows}, {cols})",
            t.offset_map.dim()
        ));
    }
    if let Some(lm) = t.landmark_map.as_ref() {
        let (channels, r, c) = lm.dim();
        if channels == 0 || channels % 2 != 0 || (r, c) != (rows, cols) {
            return violation(format!(
                "landmark map {:?} is not (2k, {rows}, {cols})",
                lm.dim()
            ));
        }
    }

    let stride = t.stride as usize;
    let (in_w, in_h) = (t.input_size.0 as usize, t.input_size.1 as usize);
    if in_w.div_ceil(stride) != cols || in_h.div_ceil(stride) != rows {
        return violation(format!(
            "grid ({rows}, {cols}) does not match input {in_w}x{in_h} at stride {stride}"
        ));
    }
    Ok(())
}
