use std::path::PathBuf;

/// Stream-level facts about a frame source.
///
/// `fps` is carried through for the sink's timing only. `total_frames` is 0
/// when the count is unknown (camera input, containers without a count).
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn is_unbounded(&self) -> bool {
        self.total_frames == 0
    }

    /// Frame rate rounded for encoder time bases, 30 when unknown.
    pub fn encoder_fps(&self) -> i32 {
        let fps = self.fps.round() as i32;
        if fps <= 0 {
            30
        } else {
            fps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/in.mp4")),
        }
    }

    #[test]
    fn test_encoder_fps_rounds() {
        assert_eq!(meta(29.97, 10).encoder_fps(), 30);
        assert_eq!(meta(24.0, 10).encoder_fps(), 24);
    }

    #[test]
    fn test_encoder_fps_defaults_when_unknown() {
        assert_eq!(meta(0.0, 1).encoder_fps(), 30);
    }

    #[test]
    fn test_unbounded_when_count_unknown() {
        assert!(meta(30.0, 0).is_unbounded());
        assert!(!meta(30.0, 100).is_unbounded());
    }
}
