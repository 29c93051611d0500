//! Eye region extraction port.

use crate::domain::{EyePair, Frame};

/// Crops eye regions out of a captured frame.
pub trait EyeRegionExtractor: Send + Sync {
    /// Returns the eye crops, or `None` if no eyes could be located.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be decoded.
    fn extract(&self, frame: &Frame) -> anyhow::Result<Option<EyePair>>;
}
