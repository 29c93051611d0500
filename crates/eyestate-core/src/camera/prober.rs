//! Capability probing: pick a device and a capture resolution.

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{CaptureDevice, ChosenResolution, LensFacing, Orientation, PixelFormat, Size};
use crate::error::CaptureError;
use crate::ports::CameraProvider;

/// Smallest width and height a preview size may have to be preferred.
pub const MINIMUM_PREVIEW_SIZE: u32 = 500;

/// Configuration for capability probing.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Lens direction to select.
    pub facing: LensFacing,
    /// Minimum width and height a chosen size should meet.
    pub minimum_size: u32,
    /// Pixel format the frame reader will request.
    pub frame_format: PixelFormat,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            facing: LensFacing::Front,
            minimum_size: MINIMUM_PREVIEW_SIZE,
            frame_format: PixelFormat::Yuv420,
        }
    }
}

/// Result of a successful probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    /// Selected device.
    pub device_id: String,
    /// Selected capture resolution.
    pub resolution: ChosenResolution,
    /// Largest display-compatible size, the aspect-ratio reference.
    pub aspect_reference: Size,
    /// View size the probe was run for.
    pub requested: Size,
}

impl ProbeOutcome {
    /// Aspect ratio the preview view should adopt in `orientation`.
    #[must_use]
    pub const fn preview_aspect(&self, orientation: Orientation) -> (u32, u32) {
        let size = self.resolution.size;
        match orientation {
            Orientation::Landscape => (size.width, size.height),
            Orientation::Portrait => (size.height, size.width),
        }
    }
}

/// Selects a capture device and resolution from a [`CameraProvider`].
#[derive(Debug, Clone, Default)]
pub struct CapabilityProber {
    config: ProbeConfig,
}

impl CapabilityProber {
    /// Creates a prober with the given configuration.
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probes `provider` for a device and resolution suitable for a view of `view` size.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnsupportedDevice`] if the capture API is unavailable,
    /// no device faces the configured direction, or the device lists no sizes.
    pub fn probe(
        &self,
        provider: &dyn CameraProvider,
        view: Size,
    ) -> Result<ProbeOutcome, CaptureError> {
        let devices = provider.devices()?;
        debug!("Found {} capture devices", devices.len());

        let device = select_device(&devices, self.config.facing).ok_or_else(|| {
            CaptureError::UnsupportedDevice(format!("no {:?} facing camera", self.config.facing))
        })?;

        let choices = if device.display_sizes.is_empty() {
            device.sizes_for(self.config.frame_format)
        } else {
            device.display_sizes.as_slice()
        };

        let size = choose_optimal_size(choices, self.config.minimum_size).ok_or_else(|| {
            CaptureError::UnsupportedDevice(format!("device {} lists no output sizes", device.id))
        })?;
        let aspect_reference = largest_by_area(choices).unwrap_or(size);

        if !device.sizes_for(self.config.frame_format).contains(&size) {
            debug!(
                "Chosen size {size} is not advertised for {:?} on device {}",
                self.config.frame_format, device.id
            );
        }

        info!(
            "Selected camera {} at {size} (reference {aspect_reference}, view {view})",
            device.id
        );

        Ok(ProbeOutcome {
            device_id: device.id.clone(),
            resolution: ChosenResolution::new(size),
            aspect_reference,
            requested: view,
        })
    }
}

/// First device facing `facing`, in enumeration order.
#[must_use]
pub fn select_device(devices: &[CaptureDevice], facing: LensFacing) -> Option<&CaptureDevice> {
    devices.iter().find(|d| d.facing == facing)
}

/// Smallest-area size whose width and height are both at least `minimum`.
///
/// Falls back to the first listed size when none qualify. Among equal areas
/// the first listed wins. Returns `None` only for an empty list.
#[must_use]
pub fn choose_optimal_size(choices: &[Size], minimum: u32) -> Option<Size> {
    let chosen = choices
        .iter()
        .filter(|s| s.covers(minimum))
        .fold(None, |best: Option<Size>, &s| match best {
            Some(b) if b.area() <= s.area() => best,
            _ => Some(s),
        });

    match chosen {
        Some(size) => {
            debug!("Chosen size: {size}");
            Some(size)
        }
        None => {
            debug!("Couldn't find any suitable preview size");
            choices.first().copied()
        }
    }
}

/// Largest-area size; the first listed wins among equals.
#[must_use]
pub fn largest_by_area(sizes: &[Size]) -> Option<Size> {
    sizes.iter().fold(None, |best: Option<Size>, &s| match best {
        Some(b) if b.area() >= s.area() => best,
        _ => Some(s),
    })
}
