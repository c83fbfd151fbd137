use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Sends every frame to several sinks, e.g. an output file and a preview.
///
/// `close` closes every sink even when an earlier one fails, then reports
/// the first failure.
pub struct FanoutWriter {
    writers: Vec<Box<dyn VideoWriter>>,
}

impl FanoutWriter {
    pub fn new(writers: Vec<Box<dyn VideoWriter>>) -> Self {
        Self { writers }
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl VideoWriter for FanoutWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for writer in &mut self.writers {
            writer.open(path, metadata)?;
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        for writer in &mut self.writers {
            writer.write(frame)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut first_err = None;
        for writer in &mut self.writers {
            if let Err(e) = writer.close() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
    }

    struct RecordingWriter {
        name: &'static str,
        log: Arc<Mutex<Log>>,
        fail_close: bool,
    }

    impl VideoWriter for RecordingWriter {
        fn open(&mut self, _: &Path, _: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
            self.log.lock().unwrap().events.push(format!("{}:open", self.name));
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.log
                .lock()
                .unwrap()
                .events
                .push(format!("{}:write{}", self.name, frame.index()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.log.lock().unwrap().events.push(format!("{}:close", self.name));
            if self.fail_close {
                Err(format!("{} failed", self.name).into())
            } else {
                Ok(())
            }
        }
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            width: 4,
            height: 4,
            fps: 30.0,
            total_frames: 1,
            codec: String::new(),
            source_path: None,
        }
    }

    fn writer(name: &'static str, log: &Arc<Mutex<Log>>, fail_close: bool) -> Box<dyn VideoWriter> {
        Box::new(RecordingWriter {
            name,
            log: log.clone(),
            fail_close,
        })
    }

    #[test]
    fn test_forwards_to_every_sink_in_order() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut fanout = FanoutWriter::new(vec![writer("a", &log, false), writer("b", &log, false)]);

        fanout.open(Path::new("out.mp4"), &metadata()).unwrap();
        fanout.write(&Frame::filled(4, 4, [0, 0, 0], 7)).unwrap();
        fanout.close().unwrap();

        assert_eq!(
            log.lock().unwrap().events,
            vec!["a:open", "b:open", "a:write7", "b:write7", "a:close", "b:close"]
        );
    }

    #[test]
    fn test_close_reaches_all_sinks_and_reports_first_error() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut fanout = FanoutWriter::new(vec![
            writer("a", &log, true),
            writer("b", &log, true),
            writer("c", &log, false),
        ]);

        let err = fanout.close().unwrap_err();
        assert_eq!(err.to_string(), "a failed");
        assert_eq!(log.lock().unwrap().events, vec!["a:close", "b:close", "c:close"]);
    }

    #[test]
    fn test_empty_fanout() {
        let mut fanout = FanoutWriter::new(Vec::new());
        assert!(fanout.is_empty());
        fanout.open(Path::new("x"), &metadata()).unwrap();
        fanout.write(&Frame::filled(4, 4, [0, 0, 0], 0)).unwrap();
        fanout.close().unwrap();
    }
}
