use ndarray::{Array2, Array3};

use crate::shared::error::AnonymizeError;
use crate::shared::frame::Frame;

/// Raw network output for one frame, laid out channel-first over the
/// output grid of `rows x cols` cells.
///
/// Read-only to the decoder and dropped right after decoding.
#[derive(Clone, Debug)]
pub struct InferenceTensors {
    /// Face-center confidence per cell, `(rows, cols)`.
    pub heatmap: Array2<f32>,
    /// Log-scale box extent, `(2, rows, cols)`: channel 0 height, 1 width.
    pub size_map: Array3<f32>,
    /// Sub-cell center offset, `(2, rows, cols)`: channel 0 y, 1 x.
    pub offset_map: Array3<f32>,
    /// Keypoints relative to the box, `(2 * points, rows, cols)` as (y, x) pairs.
    pub landmark_map: Option<Array3<f32>>,
    /// Input pixels per output cell.
    pub stride: u32,
    /// `(W, H)` of the image the network actually saw.
    pub input_size: (u32, u32),
}

/// Wraps an opaque detection network.
///
/// `target_size` is the requested inference resolution; implementations may
/// adjust it to what the network accepts and report the final value in
/// [`InferenceTensors::input_size`]. Backend errors surface as
/// [`AnonymizeError::InferenceFailure`].
pub trait InferenceAdapter: Send {
    fn infer(
        &mut self,
        frame: &Frame,
        target_size: (u32, u32),
    ) -> Result<InferenceTensors, AnonymizeError>;
}
