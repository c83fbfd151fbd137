pub mod constants;
pub mod error;
pub mod frame;
pub mod media_kind;
pub mod model_resolver;
pub mod video_metadata;
