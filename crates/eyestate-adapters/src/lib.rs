//! eyestate adapters - platform-side implementations of the core ports.
//!
//! This crate provides adapters for:
//! - Eye bundles stored as image files on disk
//! - Model downloading and caching
//! - A synthetic camera streaming a still image
//! - A fixed-offset eye region extractor
//! - Headless display, host, navigation and status sinks

pub mod camera;
pub mod extractor;
pub mod fs;
pub mod headless;
pub mod models;

pub use camera::{SyntheticCamera, SyntheticConfig};
pub use extractor::{ExtractorConfig, FixedRegionExtractor, Region};
pub use fs::{load_bitmap, FsEyeBundleSource};
pub use headless::{
    ChannelNavigator, HeadlessDisplay, HeadlessHost, LoggingStateSink, Navigation,
};
pub use models::{default_models_dir, model_path};
