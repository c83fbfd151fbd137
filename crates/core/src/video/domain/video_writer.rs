use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Frame Sink: accepts processed frames in order.
///
/// `metadata` supplies dimensions and frame rate; the frame rate is only
/// used for output timing.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output. Calling it twice is a no-op.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
