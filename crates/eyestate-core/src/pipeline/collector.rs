//! Accumulates extracted eye pairs into verification batches.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::{EyeBundle, EyePair, BATCH_SIZE};
use crate::ports::PreviewListener;

#[derive(Default)]
struct CollectorState {
    pairs: Vec<EyePair>,
    sealed: bool,
}

/// Collects eye pairs until a batch is full, then ignores further pairs
/// until reset.
pub struct CropCollector {
    state: Mutex<CollectorState>,
}

impl Default for CropCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CropCollector {
    /// Creates a collector that seals after [`BATCH_SIZE`] pairs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a pair. Returns the full bundle when this pair completes the batch.
    pub fn push(&self, pair: EyePair) -> Option<EyeBundle> {
        let mut state = self.state();
        if state.sealed {
            return None;
        }
        state.pairs.push(pair);
        debug!("Collected eye pair {}/{BATCH_SIZE}", state.pairs.len());

        if state.pairs.len() < BATCH_SIZE {
            return None;
        }
        state.sealed = true;
        Some(EyeBundle::from_pairs(std::mem::take(&mut state.pairs)))
    }

    /// Pairs collected toward the current batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().pairs.len()
    }

    /// True if no pairs are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once a batch has been handed out and no reset has happened since.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state().sealed
    }

    /// Discards pending pairs and accepts a new batch.
    pub fn reset(&self) {
        let mut state = self.state();
        state.pairs.clear();
        state.sealed = false;
    }
}

impl PreviewListener for CropCollector {
    fn deinitialize(&self) {
        debug!("Crop collector reset");
        self.reset();
    }
}
