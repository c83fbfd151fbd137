use std::path::Path;

use crate::anonymization::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::{AnonymizeError, PipelineAbort};
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Single-image pipeline: read → detect → anonymize → write.
pub struct AnonymizeImageUseCase {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    detector: Box<dyn FaceDetector>,
    anonymizer: Box<dyn FrameAnonymizer>,
}

fn abort(error: AnonymizeError) -> PipelineAbort {
    PipelineAbort {
        last_completed: None,
        error,
    }
}

impl AnonymizeImageUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        image_writer: Box<dyn ImageWriter>,
        detector: Box<dyn FaceDetector>,
        anonymizer: Box<dyn FrameAnonymizer>,
    ) -> Self {
        Self {
            reader,
            image_writer,
            detector,
            anonymizer,
        }
    }

    /// Returns the number of faces anonymized.
    pub fn execute(&mut self, input_path: &Path, output_path: &Path) -> Result<usize, PipelineAbort> {
        self.reader
            .open(input_path)
            .map_err(|e| abort(AnonymizeError::source(e)))?;
        let next = self.reader.frames().next();
        self.reader.close();
        let mut frame = next
            .ok_or_else(|| abort(AnonymizeError::SourceFailure("no frame in image".into())))?
            .map_err(|e| abort(AnonymizeError::source(e)))?;

        let detections = self.detector.detect(&frame).map_err(abort)?;
        self.anonymizer.anonymize(&mut frame, &detections);

        self.image_writer
            .write(output_path, &frame)
            .map_err(|e| abort(AnonymizeError::sink(e)))?;

        log::info!(
            "{} -> {} ({} faces)",
            input_path.display(),
            output_path.display(),
            detections.len()
        );
        Ok(detections.len())
    }
}
