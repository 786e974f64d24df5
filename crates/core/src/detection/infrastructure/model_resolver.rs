use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
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
    #[error(
        "model {0} not found; set detector.model_path (--model) or detector.model_url"
    )]
    NotFound(String),
}

/// Locate a detector model by name.
///
/// Lookup order: an explicit path, the user cache directory, then a download
/// into the cache when `url` is configured.
pub fn resolve(
    name: &str,
    explicit: Option<&Path>,
    url: Option<&str>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        log::warn!("Configured model {} does not exist", path.display());
    }

    let cache_dir = model_cache_dir()?;
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound(name.to_string()));
    };
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached_path)?;
    Ok(cached_path)
}

/// Platform cache directory for detector models,
/// e.g. `~/.cache/FaceWatch/models/` on Linux.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join("FaceWatch").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_err = |e: reqwest::Error| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let bytes = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(download_err)?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(&bytes).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_prefers_existing_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("custom.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved = resolve("facewatch-test-model.onnx", Some(&model), None).unwrap();
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_resolve_without_url_reports_not_found() {
        let result = resolve(
            "facewatch-definitely-missing-model.onnx",
            Some(Path::new("/nonexistent/model.onnx")),
            None,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound(_)));
        assert!(err.to_string().contains("--model"));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceWatch"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://127.0.0.1:9/model.onnx", &dest);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
