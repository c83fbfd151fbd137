use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`, total is 0 when unknown.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Locates detection model weights.
///
/// An explicit path must exist and is returned as-is. Otherwise the model is
/// looked up in the user cache and downloaded there on first use.
pub fn resolve(
    name: &str,
    url: &str,
    explicit: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::Missing(path.to_path_buf()))
        };
    }

    let cache_dir = model_cache_dir()?;
    let cached = cache_dir.join(name);
    if cached.is_file() {
        log::debug!("Using cached model {}", cached.display());
        return Ok(cached);
    }

    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached, progress)?;
    Ok(cached)
}

/// `$XDG_CACHE_HOME/facemask/models` on Linux, the data dir on macOS,
/// `%LOCALAPPDATA%\facemask\models` on Windows.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let partial = dest.with_extension("part");
    let result = stream_to(url, &partial, progress).and_then(|()| {
        fs::rename(&partial, dest).map_err(|e| write_error(dest, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn stream_to(url: &str, path: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(path).map_err(|e| write_error(path, e))?;
    let mut buf = vec![0u8; 256 * 1024];
    let mut downloaded = 0u64;
    loop {
        let n = response.read(&mut buf).map_err(|e| write_error(path, e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(|e| write_error(path, e))?;
        downloaded += n as u64;
        if let Some(cb) = progress.as_ref() {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: std::io::Error) -> ModelResolveError {
    ModelResolveError::Write {
        path: path.to_path_buf(),
        source,
    }
}
