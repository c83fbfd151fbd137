use std::sync::{Arc, Mutex};

use super::coordinate_rescaler::rescale;
use super::detection::Detection;
use super::detection_decoder::decode;
use super::inference_adapter::InferenceAdapter;
use crate::shared::error::AnonymizeError;
use crate::shared::frame::Frame;

/// Domain interface for per-frame face detection.
///
/// Returned boxes are in the frame's own pixel coordinates.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AnonymizeError>;
}

/// Infer → decode → rescale, with no state carried between frames.
pub struct InferenceDetector {
    adapter: Box<dyn InferenceAdapter>,
    threshold: f64,
    inference_size: Option<(u32, u32)>,
}

impl InferenceDetector {
    /// `inference_size` of `None` runs the network at the frame's native size.
    pub fn new(
        adapter: Box<dyn InferenceAdapter>,
        threshold: f64,
        inference_size: Option<(u32, u32)>,
    ) -> Self {
        Self {
            adapter,
            threshold,
            inference_size,
        }
    }
}

impl FaceDetector for InferenceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AnonymizeError> {
        let target = self.inference_size.unwrap_or(frame.size());
        let tensors = self.adapter.infer(frame, target)?;
        let decoded = decode(&tensors, self.threshold)?;
        Ok(rescale(&decoded, tensors.input_size, frame.size()))
    }
}

/// Hands one detector to several consecutive runs (e.g. every file of a
/// directory) without reloading the model for each.
#[derive(Clone)]
pub struct SharedDetector {
    inner: Arc<Mutex<Box<dyn FaceDetector>>>,
}

impl SharedDetector {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(detector)),
        }
    }
}

impl FaceDetector for SharedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AnonymizeError> {
        let mut detector = self
            .inner
            .lock()
            .map_err(|_| AnonymizeError::InferenceFailure("detector poisoned by a panic".into()))?;
        detector.detect(frame)
    }
}
