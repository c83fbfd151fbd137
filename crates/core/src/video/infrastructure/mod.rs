pub mod fanout_writer;
mod ffmpeg_encoder;
pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod image_file_reader;
pub mod image_file_writer;
pub mod preview_writer;
