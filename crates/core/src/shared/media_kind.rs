use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::constants::{CAMERA_PREFIX, IMAGE_EXTENSIONS, OUTPUT_SUFFIX, VIDEO_EXTENSIONS};

/// How an input path should be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    /// Capture device by ordinal, from names like `<video0>`.
    Camera(u32),
    Unknown,
}

impl MediaKind {
    /// Classifies an input by name: camera syntax first, then file extension.
    pub fn of(input: &str) -> Self {
        if let Some(index) = parse_camera(input) {
            return MediaKind::Camera(index);
        }
        let ext = Path::new(input)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some(e) if IMAGE_EXTENSIONS.contains(&e) => MediaKind::Image,
            Some(e) if VIDEO_EXTENSIONS.contains(&e) => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }

    pub fn of_path(path: &Path) -> Self {
        MediaKind::of(&path.to_string_lossy())
    }
}

fn parse_camera(input: &str) -> Option<u32> {
    let rest = input.strip_prefix(CAMERA_PREFIX)?.strip_suffix('>')?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.parse().ok()
}

/// `dir/name.ext` → `dir/name_anonymized.ext`.
pub fn anonymized_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{OUTPUT_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{OUTPUT_SUFFIX}"),
    };
    input.with_file_name(name)
}

/// Recursively lists files under `dir` whose extension matches `ext_filter`
/// (case-insensitive, without the dot; `*` matches everything).
///
/// Previously written `*_anonymized.*` outputs are skipped. Result is sorted.
pub fn collect_media_files(dir: &Path, ext_filter: &str) -> io::Result<Vec<PathBuf>> {
    let filter = ext_filter.trim_start_matches('.').to_lowercase();
    let mut found = Vec::new();
    walk(dir, &filter, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, filter: &str, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, filter, found)?;
            continue;
        }
        let is_output = path
            .file_stem()
            .is_some_and(|s| s.to_string_lossy().ends_with(OUTPUT_SUFFIX));
        if is_output {
            continue;
        }
        let matches = filter == "*"
            || path
                .extension()
                .is_some_and(|e| e.to_string_lossy().to_lowercase() == filter);
        if matches {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::jpeg("photo.JPG", MediaKind::Image)]
    #[case::png("dir/a.png", MediaKind::Image)]
    #[case::mp4("clip.mp4", MediaKind::Video)]
    #[case::mkv("clip.MKV", MediaKind::Video)]
    #[case::camera("<video0>", MediaKind::Camera(0))]
    #[case::camera_two("<video2>", MediaKind::Camera(2))]
    #[case::bare_camera("<video>", MediaKind::Camera(0))]
    #[case::text("notes.txt", MediaKind::Unknown)]
    #[case::no_ext("README", MediaKind::Unknown)]
    fn test_media_kind(#[case] input: &str, #[case] expected: MediaKind) {
        assert_eq!(MediaKind::of(input), expected);
    }

    #[test]
    fn test_malformed_camera_is_unknown() {
        assert_eq!(MediaKind::of("<videoX>"), MediaKind::Unknown);
    }

    #[test]
    fn test_anonymized_output_path() {
        assert_eq!(
            anonymized_output_path(Path::new("/data/clip.mp4")),
            PathBuf::from("/data/clip_anonymized.mp4")
        );
        assert_eq!(
            anonymized_output_path(Path::new("noext")),
            PathBuf::from("noext_anonymized")
        );
    }

    #[test]
    fn test_collect_media_files_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        for p in [
            dir.path().join("a.jpg"),
            dir.path().join("b.mp4"),
            nested.join("c.JPG"),
            nested.join("c_anonymized.jpg"),
        ] {
            fs::write(p, b"x").unwrap();
        }

        let all = collect_media_files(dir.path(), "*").unwrap();
        assert_eq!(all.len(), 3);

        let jpgs = collect_media_files(dir.path(), "jpg").unwrap();
        assert_eq!(jpgs, vec![dir.path().join("a.jpg"), nested.join("c.JPG")]);
    }

    #[test]
    fn test_collect_media_files_missing_dir_errors() {
        assert!(collect_media_files(Path::new("/nonexistent/dir"), "*").is_err());
    }
}
