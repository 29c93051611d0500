//! Compute device selection.

use candle_core::Device;
use tracing::info;

/// Returns the best available device for scoring.
///
/// Uses Metal or CUDA when built with the matching feature and a GPU is
/// present, otherwise the CPU.
#[must_use]
pub fn inference_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Scoring on Metal");
            return device;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Scoring on CUDA");
            return device;
        }
    }

    info!("Scoring on CPU");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build_scores_on_cpu() {
        let device = inference_device();
        if cfg!(not(any(feature = "metal", feature = "cuda"))) {
            assert!(device.is_cpu());
        }
    }
}
