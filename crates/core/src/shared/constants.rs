pub const CENTERFACE_MODEL_NAME: &str = "centerface.onnx";
pub const CENTERFACE_MODEL_URL: &str =
    "https://github.com/ORB-HD/deface/raw/master/deface/centerface.onnx";

/// Cache subdirectory under the platform cache/data dir.
pub const APP_DIR_NAME: &str = "facemask";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "webm", "wmv", "flv", "mpg", "mpeg", "ts", "3gp",
];

/// Suffix appended to the input stem for default output paths.
pub const OUTPUT_SUFFIX: &str = "_anonymized";

/// Prefix of camera input names, e.g. `<video0>`.
pub const CAMERA_PREFIX: &str = "<video";
