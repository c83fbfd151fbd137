use thiserror::Error;

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;

/// Failure while pushing one frame through an [`EncoderSession`].
#[derive(Error, Debug)]
pub(crate) enum EncodeError {
    #[error("frame {index} is {width}x{height}, stream is {stream_width}x{stream_height}")]
    SizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        stream_width: u32,
        stream_height: u32,
    },
    #[error("output stream missing")]
    StreamMissing,
    /// The muxer refused a packet.
    #[error("writing packet failed: {0}")]
    Mux(ffmpeg_next::Error),
    #[error(transparent)]
    Codec(#[from] ffmpeg_next::Error),
}

/// An opened output context with one video stream and its encoder.
///
/// Shared by the file writer and the preview window: both feed RGB frames
/// through an RGB24 -> `pixel` scaler into `codec`.
pub(crate) struct EncoderSession {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    time_base: ffmpeg_next::Rational,
    frame_count: i64,
}

const STREAM_INDEX: usize = 0;

impl EncoderSession {
    /// Adds the stream, opens the encoder and writes the container header.
    pub(crate) fn start(
        mut octx: ffmpeg_next::format::context::Output,
        codec: ffmpeg_next::Codec,
        pixel: ffmpeg_next::format::Pixel,
        metadata: &VideoMetadata,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let fps = metadata.encoder_fps();
        let time_base = ffmpeg_next::Rational(1, fps);
        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(pixel);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            pixel,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            time_base,
            frame_count: 0,
        })
    }

    pub(crate) fn encode(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if frame.size() != (self.width, self.height) {
            return Err(EncodeError::SizeMismatch {
                index: frame.index(),
                width: frame.width(),
                height: frame.height(),
                stream_width: self.width,
                stream_height: self.height,
            });
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        let row_len = self.width as usize * CHANNELS;
        let dst = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut converted = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&rgb_frame, &mut converted)?;
        converted.set_pts(Some(self.frame_count));

        self.encoder.send_frame(&converted)?;
        self.drain_packets()?;
        self.frame_count += 1;
        Ok(())
    }

    /// Flushes the encoder and writes the trailer.
    pub(crate) fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain_packets()?;
        self.octx.write_trailer()?;
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<(), EncodeError> {
        let ost_time_base = self
            .octx
            .stream(STREAM_INDEX)
            .ok_or(EncodeError::StreamMissing)?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(STREAM_INDEX);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded
                .write_interleaved(&mut self.octx)
                .map_err(EncodeError::Mux)?;
        }
        Ok(())
    }
}
