use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

use super::ffmpeg_encoder::EncoderSession;

/// Encoders tried in order; the first one ffmpeg was built with wins.
const PREFERRED_CODECS: [ffmpeg_next::codec::Id; 2] =
    [ffmpeg_next::codec::Id::H264, ffmpeg_next::codec::Id::MPEG4];

/// Encodes frames to a video file via ffmpeg-next.
///
/// Video only: no audio stream is ever written.
pub struct FfmpegWriter {
    session: Option<EncoderSession>,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self { session: None }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn find_encoder() -> Option<ffmpeg_next::Codec> {
    PREFERRED_CODECS
        .iter()
        .find_map(|&id| ffmpeg_next::encoder::find(id))
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let octx = ffmpeg_next::format::output(path)?;
        let codec = find_encoder().ok_or("no H.264 or MPEG-4 encoder available")?;
        log::debug!(
            "Encoding {} with {} at {} fps",
            path.display(),
            codec.name(),
            metadata.encoder_fps()
        );

        self.session = Some(EncoderSession::start(
            octx,
            codec,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata,
        )?);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.session
            .as_mut()
            .ok_or("FfmpegWriter: not opened")?
            .encode(frame)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.session.take() {
            Some(session) => session.finish(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_reader::VideoReader;
    use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;

    fn metadata(width: u32, height: u32, fps: f64) -> VideoMetadata {
        VideoMetadata {
            width,
            height,
            fps,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        }
    }

    #[test]
    fn test_write_creates_readable_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 25.0)).unwrap();
        for i in 0..6 {
            writer
                .write(&Frame::filled(160, 120, [(i * 40) as u8, 80, 120], i))
                .unwrap();
        }
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert_eq!(reader.frames().count(), 6);
    }

    #[test]
    fn test_unknown_fps_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 0.0)).unwrap();
        writer.write(&Frame::filled(64, 64, [0, 0, 0], 0)).unwrap();
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert!((meta.fps - 30.0).abs() < 0.5, "fps = {}", meta.fps);
    }

    #[test]
    fn test_output_has_no_audio_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 30.0)).unwrap();
        writer.write(&Frame::filled(64, 64, [5, 5, 5], 0)).unwrap();
        writer.close().unwrap();

        let ictx = ffmpeg_next::format::input(&path).unwrap();
        assert!(ictx.streams().best(ffmpeg_next::media::Type::Audio).is_none());
    }

    #[test]
    fn test_creates_missing_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 30.0)).unwrap();
        writer.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_mismatched_frame_size_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 30.0)).unwrap();
        assert!(writer.write(&Frame::filled(32, 32, [0, 0, 0], 0)).is_err());
        writer.close().unwrap();
    }

    #[test]
    fn test_write_without_open_is_error() {
        let mut writer = FfmpegWriter::new();
        assert!(writer.write(&Frame::filled(8, 8, [0, 0, 0], 0)).is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let mut writer = FfmpegWriter::new();
        writer.close().unwrap();
        writer.close().unwrap();
    }
}
