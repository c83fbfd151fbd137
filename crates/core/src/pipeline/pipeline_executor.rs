use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::anonymization::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::PipelineAbort;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Called after each emitted frame with `(frames_done, total_frames)`;
/// `total_frames` is 0 for unbounded sources. Returning `false` stops the run.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Per-run settings for a pipeline execution.
pub struct PipelineConfig {
    pub on_progress: Option<ProgressFn>,
    /// Checked between frames by every stage; set from outside to stop.
    pub cancelled: Arc<AtomicBool>,
}

/// What a run that finished without error did.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frames_emitted: usize,
    pub detections: usize,
    pub elapsed: Duration,
    /// True when the run stopped on a cancellation request rather than
    /// at the end of the source.
    pub cancelled: bool,
}

/// Abstracts how the read → detect → anonymize → write pipeline is executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations. Implementations deliver frames to the writer
/// in source order, always close the writer, and report a halted run as
/// [`PipelineAbort`].
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn FaceDetector>,
        anonymizer: Box<dyn FrameAnonymizer>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<RunSummary, PipelineAbort>;
}
