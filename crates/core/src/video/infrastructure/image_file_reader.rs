use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::ffmpeg_reader::{packed_rgb_pixels, rgb_scaler};

/// Adapts a single image file to the [`VideoReader`] interface.
///
/// Treats the image as a one-frame video with `fps=0` and `total_frames=1`,
/// so images and videos go through the same pipeline. Decoding goes
/// through ffmpeg, which handles large JPEGs much faster than the
/// pure-Rust decoders.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

// Safety: ImageFileReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for ImageFileReader {}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_single_frame(
    ictx: &mut ffmpeg_next::format::context::Input,
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
) -> Result<Frame, Box<dyn std::error::Error>> {
    for (stream, packet) in ictx.packets() {
        if stream.index() != video_stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        if let Some(frame) = try_receive_frame(decoder, scaler)? {
            return Ok(frame);
        }
    }

    // Some decoders only release the frame after EOF
    let _ = decoder.send_eof();
    try_receive_frame(decoder, scaler)?.ok_or_else(|| "Failed to decode image".into())
}

fn try_receive_frame(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
    scaler.run(&decoded, &mut rgb_frame)?;
    let (width, height) = (decoder.width(), decoder.height());
    let pixels = packed_rgb_pixels(&rgb_frame, width, height);
    Ok(Some(Frame::new(pixels, width, height, 0)))
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No image data found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = codec_ctx.decoder().video()?;
        let mut scaler = rgb_scaler(&decoder)?;

        let frame = decode_single_frame(&mut ictx, &mut decoder, &mut scaler, video_stream_index)?;
        let metadata = VideoMetadata {
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.to_path_buf()),
        };
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if self.frame.is_none() {
            return Box::new(std::iter::once(Err("ImageFileReader: not opened".into())));
        }
        Box::new(self.frame.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
