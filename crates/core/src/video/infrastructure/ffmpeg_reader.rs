use std::path::{Path, PathBuf};

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

#[cfg(target_os = "linux")]
const CAMERA_INPUT_FORMAT: &str = "video4linux2";
#[cfg(target_os = "macos")]
const CAMERA_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const CAMERA_INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CAMERA_INPUT_FORMAT: &str = "video4linux2";

/// Device name the platform capture API expects for camera `index`.
///
/// On Windows dshow addresses cameras by name; `video=N` only works for
/// devices that are literally named after their index.
pub fn camera_device_path(index: u32) -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from(index.to_string())
    } else if cfg!(target_os = "windows") {
        PathBuf::from(format!("video={index}"))
    } else {
        PathBuf::from(format!("/dev/video{index}"))
    }
}

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Reads container files by default; [`FfmpegReader::camera`] opens a
/// capture device instead, which yields frames until the caller stops.
/// Each decoded frame is converted to RGB24 and wrapped in a [`Frame`].
pub struct FfmpegReader {
    device_format: Option<&'static str>,
    state: Option<DecodeState>,
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            device_format: None,
            state: None,
        }
    }

    /// Reader for a capture device; pass [`camera_device_path`] to `open`.
    pub fn camera() -> Self {
        Self {
            device_format: Some(CAMERA_INPUT_FORMAT),
            state: None,
        }
    }

    fn open_input(
        &self,
        path: &Path,
    ) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        let Some(name) = self.device_format else {
            return Ok(ffmpeg_next::format::input(path)?);
        };
        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == name)
            .ok_or_else(|| format!("capture input '{name}' not available in this ffmpeg build"))?;
        Ok(ffmpeg_next::format::open_with(path, &format, ffmpeg_next::Dictionary::new())?.input())
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = self.open_input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = match stream.avg_frame_rate() {
            r if r.denominator() != 0 && r.numerator() != 0 => r,
            _ => stream.rate(),
        };
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let total_frames = if self.device_format.is_some() {
            0
        } else {
            stream.frames().max(0) as usize
        };

        let (width, height) = (decoder.width(), decoder.height());
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = rgb_scaler(&decoder)?;
        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
        });

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.state.as_mut() {
            Some(state) => Box::new(FfmpegFrameIter {
                state,
                frame_index: 0,
                flushing: false,
                done: false,
            }),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// RGB24 converter for the decoder's native pixel format.
pub(crate) fn rgb_scaler(
    decoder: &ffmpeg_next::decoder::Video,
) -> Result<ffmpeg_next::software::scaling::Context, ffmpeg_next::Error> {
    ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
}

/// Lazy iterator that decodes one frame per `next`, so long or endless
/// sources are never buffered in memory.
struct FfmpegFrameIter<'a> {
    state: &'a mut DecodeState,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let state = &mut *self.state;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        state.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = state.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }
        let pixels = packed_rgb_pixels(&rgb_frame, state.width, state.height);
        let frame = Frame::new(pixels, state.width, state.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.state.ictx.packets().next() else {
                let _ = self.state.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.state.video_stream_index {
                continue;
            }

            if self.state.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies an RGB24 ffmpeg frame into a tightly packed buffer, dropping
/// the per-row padding ffmpeg may add (stride > width * 3).
pub(crate) fn packed_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * CHANNELS;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
