//! Configuration file support for eyestate.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/eyestate/config.toml` (lowest priority)
//! - Project-local: `.eyestate.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device selection and session settings.
    pub camera: CameraConfig,
    /// Scoring network settings.
    pub inference: InferenceConfig,
    /// Fixed eye region settings.
    pub extractor: ExtractorSection,
    /// Steadiness thresholds.
    pub sensor: SensorConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// Camera configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Lens to use: "front" or "back".
    pub facing: Option<String>,
    /// Minimum width and height of the capture size.
    pub minimum_size: Option<u32>,
    /// Milliseconds an open or close waits for the camera lock.
    pub lock_timeout_ms: Option<u64>,
    /// Frame buffers in flight.
    pub max_images: Option<usize>,
    /// Fixed preview translation `[dx, dy]` replacing the computed transform.
    pub legacy_translate: Option<[f32; 2]>,
}

/// Inference configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Number of eye-state classes the network outputs.
    pub num_classes: Option<usize>,
}

/// Eye region configuration, each region as normalized `[x, y, w, h]`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorSection {
    /// Subject's left eye.
    pub left: Option<[f32; 4]>,
    /// Subject's right eye.
    pub right: Option<[f32; 4]>,
    /// Minimum luma standard deviation of a crop.
    pub min_contrast: Option<f32>,
}

/// Sensor configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Rotation rate in rad/s above which the device is unstable.
    pub max_rotation_rate: Option<f32>,
    /// Ambient light in lux below which the scene is too dark.
    pub min_lux: Option<f32>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
    /// Base URL model assets are fetched from.
    pub base_url: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/eyestate/config.toml`
    /// 2. Project-local: `.eyestate.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref f) = self.camera.facing {
            if f != "front" && f != "back" {
                return Err(format!("camera.facing must be 'front' or 'back', got '{f}'"));
            }
        }
        if self.camera.max_images == Some(0) {
            return Err("camera.max_images must be at least 1".to_string());
        }
        if self.inference.num_classes == Some(0) {
            return Err("inference.num_classes must be at least 1".to_string());
        }

        for (name, region) in [
            ("extractor.left", self.extractor.left),
            ("extractor.right", self.extractor.right),
        ] {
            if let Some([x, y, w, h]) = region {
                let inside = w > 0.0 && h > 0.0 && x >= 0.0 && y >= 0.0;
                if !inside || x + w > 1.0 || y + h > 1.0 {
                    return Err(format!(
                        "{name} must be a normalized [x, y, w, h] inside the frame"
                    ));
                }
            }
        }
        if let Some(c) = self.extractor.min_contrast {
            if !(0.0..=1.0).contains(&c) {
                return Err(format!("extractor.min_contrast must be 0.0-1.0, got {c}"));
            }
        }

        if let Some(r) = self.sensor.max_rotation_rate {
            if r.is_nan() || r < 0.0 {
                return Err(format!("sensor.max_rotation_rate must be >= 0, got {r}"));
            }
        }
        if let Some(l) = self.sensor.min_lux {
            if l.is_nan() || l < 0.0 {
                return Err(format!("sensor.min_lux must be >= 0, got {l}"));
            }
        }

        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                return Err(format!(
                    "output.format must be 'json' or 'jsonl', got '{f}'"
                ));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Self) {
        // Camera
        self.camera.facing = other.camera.facing.or_else(|| self.camera.facing.take());
        self.camera.minimum_size = other.camera.minimum_size.or(self.camera.minimum_size);
        self.camera.lock_timeout_ms = other
            .camera
            .lock_timeout_ms
            .or(self.camera.lock_timeout_ms);
        self.camera.max_images = other.camera.max_images.or(self.camera.max_images);
        self.camera.legacy_translate = other
            .camera
            .legacy_translate
            .or(self.camera.legacy_translate);

        // Inference
        self.inference.num_classes = other.inference.num_classes.or(self.inference.num_classes);

        // Extractor
        self.extractor.left = other.extractor.left.or(self.extractor.left);
        self.extractor.right = other.extractor.right.or(self.extractor.right);
        self.extractor.min_contrast = other
            .extractor
            .min_contrast
            .or(self.extractor.min_contrast);

        // Sensor
        self.sensor.max_rotation_rate = other
            .sensor
            .max_rotation_rate
            .or(self.sensor.max_rotation_rate);
        self.sensor.min_lux = other.sensor.min_lux.or(self.sensor.min_lux);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());
        self.models.base_url = other
            .models
            .base_url
            .or_else(|| self.models.base_url.take());

        // Output
        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eyestate").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.eyestate.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".eyestate.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
