use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::anonymization::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::{AnonymizeError, PipelineAbort};
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_executor::{PipelineConfig, PipelineExecutor, ProgressFn, RunSummary};

/// Anonymizes a video or camera stream into a sink.
///
/// Wires domain components together and delegates execution to a
/// `PipelineExecutor`. Single-use: `execute` consumes the components.
pub struct AnonymizeVideoUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    detector: Box<dyn FaceDetector>,
    anonymizer: Box<dyn FrameAnonymizer>,
    executor: Box<dyn PipelineExecutor>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
}

impl AnonymizeVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn FaceDetector>,
        anonymizer: Box<dyn FrameAnonymizer>,
        executor: Box<dyn PipelineExecutor>,
    ) -> Self {
        Self {
            reader,
            writer,
            detector,
            anonymizer,
            executor,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Shares an external stop flag (signal handler, preview window).
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Opens `input`, then streams every frame through to `output`.
    pub fn execute(self, input: &Path, output: &Path) -> Result<RunSummary, PipelineAbort> {
        let mut reader = self.reader;
        let metadata = reader.open(input).map_err(|e| PipelineAbort {
            last_completed: None,
            error: AnonymizeError::source(e),
        })?;

        log::info!(
            "Anonymizing {} ({}x{}, {}) -> {}",
            input.display(),
            metadata.width,
            metadata.height,
            if metadata.is_unbounded() {
                "live".to_string()
            } else {
                format!("{} frames", metadata.total_frames)
            },
            output.display()
        );

        self.executor.execute(
            reader,
            self.writer,
            self.detector,
            self.anonymizer,
            &metadata,
            output,
            PipelineConfig {
                on_progress: self.on_progress,
                cancelled: self.cancelled,
            },
        )
    }
}
