use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

use super::ffmpeg_encoder::{EncodeError, EncoderSession};

const PREVIEW_DEVICE: &str = "sdl";

/// Live preview window, rendered through ffmpeg's SDL output device.
///
/// The window title is the path passed to `open`. When the user closes
/// the window the SDL device answers every packet with `EIO`; the writer
/// then sets `cancel` and drops the remaining frames. Any other encode
/// failure is returned to the caller.
pub struct PreviewWriter {
    session: Option<EncoderSession>,
    cancel: Arc<AtomicBool>,
    window_closed: bool,
}

// Safety: PreviewWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for PreviewWriter {}

impl PreviewWriter {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            session: None,
            cancel,
            window_closed: false,
        }
    }
}

impl PreviewWriter {
    fn settle(&mut self, result: Result<(), EncodeError>) -> Result<(), Box<dyn std::error::Error>> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_window_closed(&e) => {
                log::info!("Preview window closed, stopping");
                self.window_closed = true;
                self.session = None;
                self.cancel.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_window_closed(error: &EncodeError) -> bool {
    matches!(
        error,
        EncodeError::Mux(ffmpeg_next::Error::Other { errno }) if *errno == ffmpeg_next::util::error::EIO
    )
}

impl VideoWriter for PreviewWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let title = path.to_string_lossy().into_owned();
        let octx = ffmpeg_next::format::output_as(&title, PREVIEW_DEVICE)
            .map_err(|e| format!("preview window unavailable ({PREVIEW_DEVICE}): {e}"))?;
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::RAWVIDEO)
            .ok_or("rawvideo encoder not found")?;

        self.session = Some(EncoderSession::start(
            octx,
            codec,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata,
        )?);
        self.window_closed = false;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if self.window_closed {
            return Ok(());
        }
        let session = self.session.as_mut().ok_or("PreviewWriter: not opened")?;
        let result = session.encode(frame);
        self.settle(result)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.session.take() {
            Some(session) => session.finish(),
            None => Ok(()),
        }
    }
}
