use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for hiding detected faces in a frame.
///
/// Implementations modify the frame in place and leave `detections`
/// untouched. An empty detection slice leaves the frame pixel-identical.
pub trait FrameAnonymizer: Send {
    fn anonymize(&self, frame: &mut Frame, detections: &[Detection]);
}
