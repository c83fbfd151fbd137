use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::anonymization::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor, RunSummary};
use crate::shared::error::{AnonymizeError, PipelineAbort};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type Detected = (Frame, Vec<Detection>);

/// Executes the pipeline with dedicated threads for I/O and detection.
///
/// Layout: `reader → detect → main [anonymize] → writer`
///
/// Stages are joined by bounded FIFO channels, so frames reach the writer
/// in source order while decoding, inference and encoding overlap.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            channel_capacity: capacity.max(1),
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        mut reader: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        detector: Box<dyn FaceDetector>,
        anonymizer: Box<dyn FrameAnonymizer>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<RunSummary, PipelineAbort> {
        let started = Instant::now();
        let cap = self.channel_capacity;

        if let Err(e) = writer.open(output_path, metadata) {
            reader.close();
            return Err(PipelineAbort {
                last_completed: None,
                error: AnonymizeError::sink(e),
            });
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<Frame, AnonymizeError>>(cap);
        let (detected_tx, detected_rx) =
            crossbeam_channel::bounded::<Result<Detected, AnonymizeError>>(cap);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(cap);

        let reader_handle = spawn_reader(reader, frame_tx, config.cancelled.clone());
        let detect_handle = spawn_detector(detector, frame_rx, detected_tx, config.cancelled.clone());
        let writer_handle = spawn_writer(writer, write_rx);

        let main = run_main_loop(
            detected_rx,
            write_tx,
            &*anonymizer,
            metadata.total_frames,
            &config,
        );

        let result = join_threads(reader_handle, detect_handle, writer_handle, main, started);
        match &result {
            Ok(summary) => log::info!(
                "{} {} frames ({} detections) in {:.1}s",
                if summary.cancelled { "Stopped after" } else { "Processed" },
                summary.frames_emitted,
                summary.detections,
                summary.elapsed.as_secs_f64()
            ),
            Err(abort) => log::debug!("Pipeline aborted: {abort}"),
        }
        result
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: Sender<Result<Frame, AnonymizeError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let failed = frame_result.is_err();
            let mapped = frame_result.map_err(AnonymizeError::source);
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        reader
    })
}

fn spawn_detector(
    mut detector: Box<dyn FaceDetector>,
    frame_rx: Receiver<Result<Frame, AnonymizeError>>,
    detected_tx: Sender<Result<Detected, AnonymizeError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in frame_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let result = frame_result
                .and_then(|frame| detector.detect(&frame).map(|detections| (frame, detections)));
            let failed = result.is_err();
            if detected_tx.send(result).is_err() || failed {
                break;
            }
        }
    })
}

struct WriterOutcome {
    writer: Box<dyn VideoWriter>,
    written: usize,
    last_index: Option<usize>,
    error: Option<AnonymizeError>,
}

fn spawn_writer(mut writer: Box<dyn VideoWriter>, write_rx: Receiver<Frame>) -> JoinHandle<WriterOutcome> {
    std::thread::spawn(move || {
        let mut written = 0;
        let mut last_index = None;
        let mut error = None;
        for frame in write_rx {
            if let Err(e) = writer.write(&frame) {
                error = Some(AnonymizeError::sink(e));
                break;
            }
            written += 1;
            last_index = Some(frame.index());
        }
        WriterOutcome {
            writer,
            written,
            last_index,
            error,
        }
    })
}

#[derive(Default)]
struct MainOutcome {
    sent: usize,
    detections: usize,
    cancelled: bool,
    error: Option<AnonymizeError>,
}

/// Anonymizes detected frames in arrival order and hands them to the writer.
///
/// Dropping `detected_rx` and `write_tx` on return unblocks the other
/// stages: upstream sends fail, the writer drains what it has and exits.
fn run_main_loop(
    detected_rx: Receiver<Result<Detected, AnonymizeError>>,
    write_tx: Sender<Frame>,
    anonymizer: &dyn FrameAnonymizer,
    total_frames: usize,
    config: &PipelineConfig,
) -> MainOutcome {
    let mut outcome = MainOutcome::default();

    for detected in detected_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            break;
        }
        let (mut frame, detections) = match detected {
            Ok(pair) => pair,
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        };

        anonymizer.anonymize(&mut frame, &detections);
        outcome.detections += detections.len();

        // a closed channel means the writer failed; its error surfaces on join
        if write_tx.send(frame).is_err() {
            break;
        }
        outcome.sent += 1;

        if let Some(ref callback) = config.on_progress {
            if !callback(outcome.sent, total_frames) {
                config.cancelled.store(true, Ordering::Relaxed);
                break;
            }
        }
    }

    outcome.cancelled = config.cancelled.load(Ordering::Relaxed);
    outcome
}

fn set_if_none(slot: &mut Option<AnonymizeError>, err: AnonymizeError) {
    if slot.is_none() {
        *slot = Some(err);
    }
}

/// Joins all pipeline threads, closes reader and writer, and coalesces
/// the first error encountered.
fn join_threads(
    reader_handle: JoinHandle<Box<dyn VideoReader>>,
    detect_handle: JoinHandle<()>,
    writer_handle: JoinHandle<WriterOutcome>,
    main: MainOutcome,
    started: Instant,
) -> Result<RunSummary, PipelineAbort> {
    let mut first_error = main.error;

    match reader_handle.join() {
        Ok(mut reader) => reader.close(),
        Err(_) => set_if_none(
            &mut first_error,
            AnonymizeError::SourceFailure("reader thread panicked".into()),
        ),
    }

    if detect_handle.join().is_err() {
        set_if_none(
            &mut first_error,
            AnonymizeError::InferenceFailure("detection thread panicked".into()),
        );
    }

    let (written, last_completed) = match writer_handle.join() {
        Ok(mut outcome) => {
            if let Some(e) = outcome.error.take() {
                set_if_none(&mut first_error, e);
            }
            if let Err(e) = outcome.writer.close() {
                set_if_none(&mut first_error, AnonymizeError::sink(e));
            }
            (outcome.written, outcome.last_index)
        }
        Err(_) => {
            set_if_none(
                &mut first_error,
                AnonymizeError::SinkFailure("writer thread panicked".into()),
            );
            (0, None)
        }
    };

    match first_error {
        Some(error) => Err(PipelineAbort {
            last_completed,
            error,
        }),
        None => Ok(RunSummary {
            frames_emitted: written,
            detections: main.detections,
            elapsed: started.elapsed(),
            cancelled: main.cancelled,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;
    use std::sync::Mutex;

    // --- Stubs ---

    type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

    enum Item {
        Frame,
        Fail,
    }

    struct StubReader {
        items: Vec<Item>,
        endless: bool,
        closed: Arc<Mutex<usize>>,
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(metadata(0))
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            if self.endless {
                return Box::new((0..).map(|i| -> FrameResult { Ok(Frame::filled(8, 8, [0, 0, 0], i)) }));
            }
            Box::new(self.items.drain(..).enumerate().map(|(i, item)| -> FrameResult {
                match item {
                    Item::Frame => Ok(Frame::filled(8, 8, [0, 0, 0], i)),
                    Item::Fail => Err("corrupt packet".into()),
                }
            }))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    #[derive(Clone, Default)]
    struct WriterSpy {
        opened: Arc<Mutex<bool>>,
        written: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<Mutex<usize>>,
    }

    struct StubWriter {
        spy: WriterSpy,
        fail_open: bool,
        fail_at: Option<usize>,
    }

    impl VideoWriter for StubWriter {
        fn open(&mut self, _: &Path, _: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("cannot create output".into());
            }
            *self.spy.opened.lock().unwrap() = true;
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_at == Some(frame.index()) {
                return Err("disk full".into());
            }
            self.spy.written.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.spy.closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// One detection per frame; fails on `fail_at`.
    struct StubDetector {
        fail_at: Option<usize>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AnonymizeError> {
            if self.fail_at == Some(frame.index()) {
                return Err(AnonymizeError::InferenceFailure("backend lost".into()));
            }
            Ok(vec![Detection {
                score: 0.9,
                bbox: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
                landmarks: None,
            }])
        }
    }

    /// Paints the frame index into the first pixel.
    struct MarkingAnonymizer;

    impl FrameAnonymizer for MarkingAnonymizer {
        fn anonymize(&self, frame: &mut Frame, detections: &[Detection]) {
            let mark = (frame.index() % 256) as u8;
            if !detections.is_empty() {
                frame.set_pixel(0, 0, [mark, 1, 1]);
            }
        }
    }

    fn metadata(total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 8,
            height: 8,
            fps: 30.0,
            total_frames,
            codec: String::new(),
            source_path: None,
        }
    }

    fn reader(items: Vec<Item>, closed: &Arc<Mutex<usize>>) -> Box<dyn VideoReader> {
        Box::new(StubReader {
            items,
            endless: false,
            closed: closed.clone(),
        })
    }

    fn frames(n: u32) -> Vec<Item> {
        (0..n).map(|_| Item::Frame).collect()
    }

    fn writer(spy: &WriterSpy, fail_at: Option<usize>) -> Box<dyn VideoWriter> {
        Box::new(StubWriter {
            spy: spy.clone(),
            fail_open: false,
            fail_at,
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn run(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector_fail_at: Option<usize>,
        total: usize,
        config: PipelineConfig,
    ) -> Result<RunSummary, PipelineAbort> {
        ThreadedPipelineExecutor::with_channel_capacity(2).execute(
            reader,
            writer,
            Box::new(StubDetector {
                fail_at: detector_fail_at,
            }),
            Box::new(MarkingAnonymizer),
            &metadata(total),
            Path::new("out.mp4"),
            config,
        )
    }

    #[test]
    fn test_all_frames_written_in_order() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();

        let summary = run(reader(frames(20), &closed), writer(&spy, None), None, 20, config()).unwrap();

        assert_eq!(summary.frames_emitted, 20);
        assert_eq!(summary.detections, 20);
        assert!(!summary.cancelled);
        let written = spy.written.lock().unwrap();
        let indices: Vec<usize> = written.iter().map(|f| f.index()).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        for f in written.iter() {
            assert_eq!(f.pixel(0, 0), [f.index() as u8, 1, 1]);
        }
        assert_eq!(*spy.closed.lock().unwrap(), 1);
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_empty_source() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let summary = run(reader(Vec::new(), &closed), writer(&spy, None), None, 0, config()).unwrap();
        assert_eq!(summary.frames_emitted, 0);
        assert!(*spy.opened.lock().unwrap());
        assert_eq!(*spy.closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_inference_failure_halts_and_reports_last_frame() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();

        let abort = run(reader(frames(10), &closed), writer(&spy, None), Some(3), 10, config()).unwrap_err();

        assert!(matches!(abort.error, AnonymizeError::InferenceFailure(_)));
        assert_eq!(abort.last_completed, Some(2));
        assert_eq!(spy.written.lock().unwrap().len(), 3);
        assert_eq!(*spy.closed.lock().unwrap(), 1);
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_source_failure_halts() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let items = vec![Item::Frame, Item::Frame, Item::Fail, Item::Frame];

        let abort = run(reader(items, &closed), writer(&spy, None), None, 4, config()).unwrap_err();

        assert_eq!(
            abort.error,
            AnonymizeError::SourceFailure("corrupt packet".into())
        );
        assert_eq!(abort.last_completed, Some(1));
        assert_eq!(*spy.closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_sink_failure_flushes_and_reports() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();

        let abort = run(reader(frames(30), &closed), writer(&spy, Some(2)), None, 30, config()).unwrap_err();

        assert_eq!(abort.error, AnonymizeError::SinkFailure("disk full".into()));
        assert_eq!(abort.last_completed, Some(1));
        assert_eq!(*spy.closed.lock().unwrap(), 1);
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_sink_failure_on_first_frame_has_no_last_completed() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let abort = run(reader(frames(3), &closed), writer(&spy, Some(0)), None, 3, config()).unwrap_err();
        assert_eq!(abort.last_completed, None);
    }

    #[test]
    fn test_writer_open_failure() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let failing = Box::new(StubWriter {
            spy: spy.clone(),
            fail_open: true,
            fail_at: None,
        });

        let abort = run(reader(frames(3), &closed), failing, None, 3, config()).unwrap_err();

        assert!(matches!(abort.error, AnonymizeError::SinkFailure(_)));
        assert_eq!(abort.last_completed, None);
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_progress_reports_every_frame() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let config = PipelineConfig {
            on_progress: Some(Box::new(move |done, total| {
                seen_cb.lock().unwrap().push((done, total));
                true
            })),
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        run(reader(frames(4), &closed), writer(&spy, None), None, 4, config).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_progress_callback_cancels_unbounded_source() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let endless = Box::new(StubReader {
            items: Vec::new(),
            endless: true,
            closed: closed.clone(),
        });
        let cancelled = Arc::new(AtomicBool::new(false));
        let config = PipelineConfig {
            on_progress: Some(Box::new(|done, _| done < 5)),
            cancelled: cancelled.clone(),
        };

        let summary = run(endless, writer(&spy, None), None, 0, config).unwrap();

        assert!(summary.cancelled);
        assert!(cancelled.load(Ordering::Relaxed));
        assert_eq!(summary.frames_emitted, 5);
        let indices: Vec<usize> = spy.written.lock().unwrap().iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(*spy.closed.lock().unwrap(), 1);
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_external_cancel_before_start() {
        let closed = Arc::new(Mutex::new(0));
        let spy = WriterSpy::default();
        let config = config();
        config.cancelled.store(true, Ordering::Relaxed);

        let summary = run(reader(frames(10), &closed), writer(&spy, None), None, 10, config).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.frames_emitted, 0);
        assert_eq!(*spy.closed.lock().unwrap(), 1);
    }
}
