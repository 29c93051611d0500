//! Per-frame work on the frame worker.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::collector::CropCollector;
use crate::domain::{EyeBundle, Frame};
use crate::ports::{EyeRegionExtractor, Navigator};

/// Crops each frame and forwards full batches to verification.
pub struct FrameProcessor {
    extractor: Arc<dyn EyeRegionExtractor>,
    collector: Arc<CropCollector>,
    navigator: Arc<dyn Navigator>,
    bundles: Sender<EyeBundle>,
}

impl FrameProcessor {
    /// Creates a processor that sends completed bundles to `bundles`.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn EyeRegionExtractor>,
        collector: Arc<CropCollector>,
        navigator: Arc<dyn Navigator>,
        bundles: Sender<EyeBundle>,
    ) -> Self {
        Self {
            extractor,
            collector,
            navigator,
            bundles,
        }
    }

    /// Handles one frame. The frame's buffer is released before any
    /// batch hand-off.
    pub fn process(&self, frame: Frame) {
        if self.collector.is_sealed() {
            return;
        }

        let extracted = self.extractor.extract(&frame);
        let timestamp = frame.timestamp();
        drop(frame);

        let pair = match extracted {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("No eyes in frame at {timestamp:?}");
                return;
            }
            Err(e) => {
                warn!("Eye extraction failed: {e:#}");
                return;
            }
        };

        if let Some(bundle) = self.collector.push(pair) {
            self.navigator.on_eyes_captured(&bundle);
            if self.bundles.send(bundle).is_err() {
                warn!("Inference worker is gone, dropping eye bundle");
            }
        }
    }
}
