pub mod anonymize_image_use_case;
pub mod anonymize_video_use_case;
pub mod infrastructure;
pub mod pipeline_executor;
