/// CenterFace network binding on ONNX Runtime via `ort`.
///
/// Feeds raw RGB values (0..255, NCHW, no normalisation) and returns the
/// four CenterFace outputs: heatmap `[1,1,h,w]`, log-size `[1,2,h,w]`,
/// offset `[1,2,h,w]` and landmarks `[1,10,h,w]`, at stride 4.
use std::path::Path;

use ndarray::{Array3, Array4, Axis};

use crate::detection::domain::inference_adapter::{InferenceAdapter, InferenceTensors};
use crate::shared::error::AnonymizeError;
use crate::shared::frame::{Frame, CHANNELS};

use super::execution_provider::ExecutionBackend;

/// Input pixels per output cell.
pub const CENTERFACE_STRIDE: u32 = 4;

/// Spatial input dimensions must be multiples of this.
const INPUT_MULTIPLE: u32 = 32;

pub struct OnnxCenterFaceAdapter {
    session: ort::session::Session,
    /// Set when the model declares a static spatial input shape.
    fixed_input: Option<(u32, u32)>,
    warned_fixed: bool,
}

impl OnnxCenterFaceAdapter {
    pub fn new(model_path: &Path, backend: ExecutionBackend) -> Result<Self, AnonymizeError> {
        let session = ort::session::Session::builder()
            .map_err(AnonymizeError::inference)?
            .with_execution_providers(backend.execution_providers())
            .map_err(AnonymizeError::inference)?
            .commit_from_file(model_path)
            .map_err(AnonymizeError::inference)?;

        // NCHW: a positive H and W means the model only accepts that size
        let fixed_input = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() == 4 && shape[2] > 0 && shape[3] > 0 {
                    Some((shape[3] as u32, shape[2] as u32))
                } else {
                    None
                }
            } else {
                None
            }
        });

        log::info!(
            "Loaded {} on {backend} (input {})",
            model_path.display(),
            fixed_input.map_or("dynamic".to_string(), |(w, h)| format!("{w}x{h}"))
        );

        Ok(Self {
            session,
            fixed_input,
            warned_fixed: false,
        })
    }

    fn network_input_size(&mut self, target: (u32, u32)) -> (u32, u32) {
        match self.fixed_input {
            Some(fixed) => {
                if fixed != round_to_input_multiple(target) && !self.warned_fixed {
                    log::warn!(
                        "Model input is fixed at {}x{}, ignoring requested {}x{}",
                        fixed.0,
                        fixed.1,
                        target.0,
                        target.1
                    );
                    self.warned_fixed = true;
                }
                fixed
            }
            None => round_to_input_multiple(target),
        }
    }
}

impl InferenceAdapter for OnnxCenterFaceAdapter {
    fn infer(
        &mut self,
        frame: &Frame,
        target_size: (u32, u32),
    ) -> Result<InferenceTensors, AnonymizeError> {
        let input_size = self.network_input_size(target_size);
        let tensor = preprocess(frame, input_size)?;

        let input = ort::value::Tensor::from_array(tensor).map_err(AnonymizeError::inference)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(AnonymizeError::inference)?;
        if outputs.len() < 3 {
            return Err(AnonymizeError::InferenceFailure(format!(
                "CenterFace model expected at least 3 outputs, got {}",
                outputs.len()
            )));
        }

        let heatmap = channel_grid(&outputs[0], "heatmap")?.index_axis_move(Axis(0), 0);
        let size_map = channel_grid(&outputs[1], "scale")?;
        let offset_map = channel_grid(&outputs[2], "offset")?;
        let landmark_map = if outputs.len() > 3 {
            Some(channel_grid(&outputs[3], "landmarks")?)
        } else {
            None
        };

        Ok(InferenceTensors {
            heatmap,
            size_map,
            offset_map,
            landmark_map,
            stride: CENTERFACE_STRIDE,
            input_size,
        })
    }
}

/// Rounds each dimension up to the next multiple of 32 (minimum 32).
pub fn round_to_input_multiple((w, h): (u32, u32)) -> (u32, u32) {
    let up = |v: u32| v.max(1).div_ceil(INPUT_MULTIPLE) * INPUT_MULTIPLE;
    (up(w), up(h))
}

/// Resizes (bilinear) to `(W, H)` and lays the frame out as `[1, 3, H, W]` f32.
fn preprocess(frame: &Frame, (w, h): (u32, u32)) -> Result<Array4<f32>, AnonymizeError> {
    let resized;
    let pixels: &[u8] = if frame.size() == (w, h) {
        frame.data()
    } else {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| AnonymizeError::InferenceFailure("frame buffer size mismatch".into()))?;
        resized = image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle);
        resized.as_raw()
    };

    let (w, h) = (w as usize, h as usize);
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, h, w));
    for y in 0..h {
        for x in 0..w {
            let o = (y * w + x) * CHANNELS;
            for c in 0..CHANNELS {
                tensor[[0, c, y, x]] = pixels[o + c] as f32;
            }
        }
    }
    Ok(tensor)
}

/// Extracts a `[1, C, H, W]` output as an owned `(C, H, W)` array.
fn channel_grid(value: &ort::value::DynValue, name: &str) -> Result<Array3<f32>, AnonymizeError> {
    let view = value
        .try_extract_array::<f32>()
        .map_err(AnonymizeError::inference)?;
    let shape = view.shape().to_vec();
    if shape.len() != 4 || shape[0] != 1 {
        return Err(AnonymizeError::DecodeInvariantViolation(format!(
            "{name} output has shape {shape:?}, expected [1, C, H, W]"
        )));
    }
    view.to_owned()
        .into_shape_with_order((shape[1], shape[2], shape[3]))
        .map_err(|e| AnonymizeError::DecodeInvariantViolation(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case((640, 360), (640, 384))]
    #[case((1920, 1080), (1920, 1088))]
    #[case((32, 32), (32, 32))]
    #[case((1, 0), (32, 32))]
    #[case((33, 95), (64, 96))]
    fn test_round_to_input_multiple(#[case] input: (u32, u32), #[case] expected: (u32, u32)) {
        assert_eq!(round_to_input_multiple(input), expected);
    }

    #[test]
    fn test_preprocess_native_size_keeps_raw_values() {
        let mut frame = Frame::filled(32, 32, [10, 20, 30], 0);
        frame.set_pixel(5, 7, [255, 0, 128]);

        let tensor = preprocess(&frame, (32, 32)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(tensor[[0, 0, 0, 0]], 10.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 20.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 30.0);
        assert_eq!(tensor[[0, 0, 7, 5]], 255.0);
        assert_eq!(tensor[[0, 2, 7, 5]], 128.0);
    }

    #[test]
    fn test_preprocess_resizes_to_target() {
        let frame = Frame::filled(100, 50, [200, 100, 50], 0);
        let tensor = preprocess(&frame, (64, 32)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 64]);
        // uniform input stays uniform under bilinear resize
        assert!((tensor[[0, 0, 16, 32]] - 200.0).abs() < 1.0);
        assert!((tensor[[0, 2, 31, 63]] - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_missing_model_is_inference_failure() {
        let result = OnnxCenterFaceAdapter::new(
            Path::new("/nonexistent/centerface.onnx"),
            ExecutionBackend::Cpu,
        );
        assert!(matches!(result, Err(AnonymizeError::InferenceFailure(_))));
    }
}
