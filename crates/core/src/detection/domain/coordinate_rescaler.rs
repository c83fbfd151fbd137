use super::detection::{BoundingBox, Detection};

/// Maps detections from `from_size` to `to_size` (both `(W, H)`), scaling
/// each axis independently.
///
/// Boxes are clamped to `[0, W] x [0, H]` of the target; boxes left with no
/// area are dropped. Landmarks are scaled but not clamped.
pub fn rescale(detections: &[Detection], from_size: (u32, u32), to_size: (u32, u32)) -> Vec<Detection> {
    if from_size.0 == 0 || from_size.1 == 0 {
        return Vec::new();
    }
    let sx = to_size.0 as f64 / from_size.0 as f64;
    let sy = to_size.1 as f64 / from_size.1 as f64;
    let (max_x, max_y) = (to_size.0 as f64, to_size.1 as f64);

    detections
        .iter()
        .filter_map(|d| {
            let b = &d.bbox;
            let x1 = (b.x * sx).clamp(0.0, max_x);
            let y1 = (b.y * sy).clamp(0.0, max_y);
            let x2 = (b.right() * sx).clamp(0.0, max_x);
            let y2 = (b.bottom() * sy).clamp(0.0, max_y);
            if x2 - x1 <= 0.0 || y2 - y1 <= 0.0 {
                log::trace!("Dropping degenerate box at ({x1:.1}, {y1:.1})");
                return None;
            }

            let landmarks = d
                .landmarks
                .as_ref()
                .map(|pts| pts.iter().map(|&(x, y)| (x * sx, y * sy)).collect());

            Some(Detection {
                score: d.score,
                bbox: BoundingBox::from_corners(x1, y1, x2, y2),
                landmarks,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn det(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection {
            score: 0.8,
            bbox: BoundingBox::new(x, y, w, h),
            landmarks: Some(vec![(x + 1.0, y + 2.0), (x + w / 2.0, y + h / 2.0)]),
        }
    }

    fn assert_close(a: &[Detection], b: &[Detection]) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b) {
            assert_eq!(p.score, q.score);
            assert_relative_eq!(p.bbox.x, q.bbox.x, max_relative = 1e-3, epsilon = 1e-9);
            assert_relative_eq!(p.bbox.y, q.bbox.y, max_relative = 1e-3, epsilon = 1e-9);
            assert_relative_eq!(p.bbox.width, q.bbox.width, max_relative = 1e-3);
            assert_relative_eq!(p.bbox.height, q.bbox.height, max_relative = 1e-3);
            let (lp, lq) = (p.landmarks.as_ref().unwrap(), q.landmarks.as_ref().unwrap());
            for (u, v) in lp.iter().zip(lq) {
                assert_relative_eq!(u.0, v.0, max_relative = 1e-3);
                assert_relative_eq!(u.1, v.1, max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn test_independent_axis_factors() {
        let out = rescale(&[det(10.0, 20.0, 30.0, 40.0)], (100, 100), (200, 50));
        let b = out[0].bbox;
        assert_relative_eq!(b.x, 20.0);
        assert_relative_eq!(b.y, 10.0);
        assert_relative_eq!(b.width, 60.0);
        assert_relative_eq!(b.height, 20.0);
        let lm = out[0].landmarks.as_ref().unwrap();
        assert_relative_eq!(lm[0].0, 22.0);
        assert_relative_eq!(lm[0].1, 11.0);
    }

    #[rstest]
    #[case::up((320, 192), (1280, 720))]
    #[case::down((1920, 1080), (640, 384))]
    #[case::odd((333, 211), (1017, 999))]
    #[case::identity((640, 480), (640, 480))]
    fn test_round_trip(#[case] a: (u32, u32), #[case] b: (u32, u32)) {
        let (w, h) = (a.0 as f64, a.1 as f64);
        let dets = vec![
            det(0.1 * w, 0.1 * h, 0.2 * w, 0.3 * h),
            det(0.5 * w, 0.4 * h, 0.45 * w, 0.5 * h),
            det(0.0, 0.0, w, h),
        ];
        let there = rescale(&dets, a, b);
        let back = rescale(&there, b, a);
        assert_close(&back, &dets);
    }

    #[test]
    fn test_boxes_clamped_to_target() {
        let out = rescale(&[det(-10.0, -5.0, 60.0, 200.0)], (100, 100), (100, 100));
        let b = out[0].bbox;
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(b.y, 0.0);
        assert_relative_eq!(b.width, 50.0);
        assert_relative_eq!(b.bottom(), 100.0);
    }

    #[test]
    fn test_box_outside_frame_dropped() {
        let dets = vec![det(150.0, 10.0, 20.0, 20.0), det(10.0, 10.0, 20.0, 20.0)];
        let out = rescale(&dets, (100, 100), (100, 100));
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].bbox.x, 10.0);
    }

    #[test]
    fn test_zero_area_box_dropped() {
        let out = rescale(&[det(10.0, 10.0, 0.0, 20.0)], (100, 100), (200, 200));
        assert!(out.is_empty());
    }

    #[test]
    fn test_input_not_mutated() {
        let dets = vec![det(10.0, 10.0, 20.0, 20.0)];
        let snapshot = dets.clone();
        let _ = rescale(&dets, (100, 100), (50, 50));
        assert_eq!(dets, snapshot);
    }

    #[test]
    fn test_zero_source_size_yields_nothing() {
        assert!(rescale(&[det(1.0, 1.0, 2.0, 2.0)], (0, 100), (100, 100)).is_empty());
    }
}
