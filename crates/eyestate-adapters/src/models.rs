//! Model downloading and caching adapter.
//!
//! The eye-state network ships as two assets: a safetensors weight file and a
//! newline-delimited labels file. Both live in one models directory and are
//! fetched from a configured base URL.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Model asset metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Asset name/identifier.
    pub name: &'static str,
    /// Filename in the models directory and under the base URL.
    pub filename: &'static str,
    /// Expected SHA256 hash. `None` skips verification.
    pub sha256: Option<&'static str>,
}

/// Weight file asset name.
pub const WEIGHTS: &str = "eye-state";
/// Labels file asset name.
pub const LABELS: &str = "labels";

/// Known model assets.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: WEIGHTS,
        filename: "eye_state.safetensors",
        sha256: None,
    },
    ModelInfo {
        name: LABELS,
        filename: "labels.txt",
        sha256: None,
    },
];

/// Callback receiving `(asset name, bytes downloaded, total bytes)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Returns the default models directory path.
///
/// Uses `XDG_DATA_HOME/eyestate/models` or `~/.local/share/eyestate/models`.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eyestate")
        .join("models")
}

/// Returns the path of a named asset inside `dir`.
#[must_use]
pub fn model_path(dir: &Path, name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| dir.join(m.filename))
}

/// Checks if every asset is present in `dir`.
#[must_use]
pub fn all_models_installed(dir: &Path) -> bool {
    MODELS.iter().all(|m| dir.join(m.filename).exists())
}

/// Lists assets with their install status.
#[must_use]
pub fn list_models(dir: &Path) -> Vec<(&'static ModelInfo, bool)> {
    MODELS
        .iter()
        .map(|m| (m, dir.join(m.filename).exists()))
        .collect()
}

/// Downloads any missing asset from `base_url` into `dir`.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A download fails
/// - A checksum doesn't match
pub fn fetch_models(dir: &Path, base_url: &str) -> Result<()> {
    fetch_models_with_progress(dir, base_url, None)
}

/// Like [`fetch_models`], reporting progress through `progress`.
///
/// # Errors
///
/// See [`fetch_models`].
pub fn fetch_models_with_progress(
    dir: &Path,
    base_url: &str,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    fs::create_dir_all(dir).context("Failed to create models directory")?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            let url = asset_url(base_url, model.filename);
            download_model(model, &url, &path, progress)?;
        }
    }

    Ok(())
}

fn asset_url(base_url: &str, filename: &str) -> String {
    format!("{}/{filename}", base_url.trim_end_matches('/'))
}

/// Downloads one asset and writes it atomically to `path`.
fn download_model(
    model: &ModelInfo,
    url: &str,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model: {} from {url}", model.name);

    let mut response =
        reqwest::blocking::get(url).with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    let mut bytes = Vec::with_capacity(usize::try_from(total.unwrap_or(0)).unwrap_or(0));
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = response
            .read(&mut chunk)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(model.name, bytes.len() as u64, total);
        }
    }

    verify_checksum(model, &bytes, path)?;

    let partial = path.with_extension("part");
    fs::write(&partial, &bytes).with_context(|| format!("Failed to write {}", model.name))?;
    fs::rename(&partial, path).with_context(|| format!("Failed to install {}", model.name))?;

    info!("Downloaded {} ({} bytes)", model.name, bytes.len());
    Ok(())
}

fn verify_checksum(model: &ModelInfo, bytes: &[u8], path: &Path) -> Result<()> {
    let Some(expected) = model.sha256 else {
        debug!("No checksum configured for {}", model.name);
        return Ok(());
    };

    let hash = format!("{:x}", Sha256::digest(bytes));
    if hash != expected {
        anyhow::bail!(
            "Checksum mismatch for {}: expected {}, got {}. \
             Try deleting {} and re-running to download a fresh copy.",
            model.name,
            expected,
            hash,
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().ends_with("eyestate/models"));
    }

    #[test]
    fn test_model_path() {
        let path = model_path(Path::new("/m"), WEIGHTS).unwrap();
        assert_eq!(path, Path::new("/m/eye_state.safetensors"));
        assert!(model_path(Path::new("/m"), "unknown").is_none());
    }

    #[test]
    fn test_asset_url_joins_once() {
        assert_eq!(
            asset_url("https://host/models/", "labels.txt"),
            "https://host/models/labels.txt"
        );
        assert_eq!(asset_url("http://h", "a"), "http://h/a");
    }

    #[test]
    fn test_list_models_reports_installed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("labels.txt"), "open\nclosed").unwrap();

        let listed = list_models(dir.path());
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|(m, ok)| m.name == LABELS && *ok));
        assert!(listed.iter().any(|(m, ok)| m.name == WEIGHTS && !*ok));
        assert!(!all_models_installed(dir.path()));
    }

    #[test]
    fn test_fetch_skips_installed_assets() {
        let dir = tempfile::tempdir().unwrap();
        for m in MODELS {
            fs::write(dir.path().join(m.filename), b"x").unwrap();
        }
        // Unreachable URL: nothing should be downloaded.
        fetch_models(dir.path(), "http://127.0.0.1:9").unwrap();
    }

    #[test]
    fn test_checksum_mismatch_is_reported() {
        let model = ModelInfo {
            name: "x",
            filename: "x.bin",
            sha256: Some("00"),
        };
        let err = verify_checksum(&model, b"abc", Path::new("x.bin")).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));

        let ok = ModelInfo {
            sha256: Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
            ..model
        };
        verify_checksum(&ok, b"abc", Path::new("x.bin")).unwrap();
    }
}
