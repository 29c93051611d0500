//! Batch verification of captured eye pairs.

use std::time::Instant;

use tracing::{debug, info};

use super::engine::InferenceEngine;
use super::preprocess::build_eye_tensors;
use crate::domain::{EyeBundle, InferenceResult, ResultBatch, BATCH_SIZE};
use crate::error::InferenceError;

/// Scores every pair in `bundle` and collects the results.
///
/// Each entry records the time elapsed since the batch started.
///
/// # Errors
///
/// Returns [`InferenceError::IncompleteBatch`] unless the bundle holds exactly
/// [`BATCH_SIZE`] pairs, or the first scoring error.
pub fn verify(engine: &InferenceEngine, bundle: &EyeBundle) -> Result<ResultBatch, InferenceError> {
    if bundle.len() != BATCH_SIZE {
        return Err(InferenceError::IncompleteBatch {
            expected: BATCH_SIZE,
            actual: bundle.len(),
        });
    }

    let start = Instant::now();
    let mut entries = Vec::with_capacity(BATCH_SIZE);
    for (index, pair) in bundle.pairs().enumerate() {
        let tensors = build_eye_tensors(&pair.left, &pair.right)?;
        let scores = engine.score_eyes(&tensors)?;
        debug!("Pair {index}: {:?}", engine.top_label(&scores));
        entries.push(InferenceResult {
            scores,
            left: pair.left.clone(),
            right: pair.right.clone(),
            elapsed: start.elapsed(),
        });
    }

    let batch = ResultBatch::new(entries, start.elapsed());
    info!(
        "Verified {} eye pairs in {} hundredths of a second",
        batch.len(),
        batch.verification_time()
    );
    Ok(batch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::{EyeBitmap, EyePair, EyeTensors};
    use crate::inference::{EngineConfig, ScoringGraph};
    use candle_core::Device;
    use image::{Rgba, RgbaImage};

    struct Uniform;

    impl ScoringGraph for Uniform {
        fn num_classes(&self) -> usize {
            7
        }

        fn run(&self, _: &EyeTensors) -> Result<[Vec<f32>; 2], InferenceError> {
            Ok([vec![1.0 / 7.0; 7], vec![1.0 / 7.0; 7]])
        }
    }

    fn ready_engine() -> InferenceEngine {
        let engine = InferenceEngine::with_device(EngineConfig::default(), Device::Cpu);
        engine.initialize_with(Box::new(Uniform), Vec::new()).unwrap();
        engine
    }

    fn bundle(n: usize) -> EyeBundle {
        let eye = EyeBitmap::new(RgbaImage::from_pixel(40, 20, Rgba([128, 128, 128, 255])));
        EyeBundle::from_pairs(
            (0..n)
                .map(|_| EyePair {
                    left: eye.clone(),
                    right: eye.clone(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_verify_full_batch() {
        let batch = verify(&ready_engine(), &bundle(5)).unwrap();
        assert_eq!(batch.len(), 5);
        for entry in batch.entries() {
            assert_eq!(entry.scores.len(), 7);
            assert!(entry.elapsed <= batch.elapsed());
        }
    }

    #[test]
    fn test_entry_times_are_cumulative() {
        let batch = verify(&ready_engine(), &bundle(5)).unwrap();
        let times: Vec<_> = batch.entries().iter().map(|e| e.elapsed).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_verify_rejects_short_bundle() {
        let result = verify(&ready_engine(), &bundle(4));
        assert!(matches!(
            result,
            Err(InferenceError::IncompleteBatch {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_collected_batch_verifies() {
        let collector = crate::pipeline::CropCollector::new();
        let sealed = bundle(BATCH_SIZE)
            .pairs()
            .cloned()
            .find_map(|pair| collector.push(pair))
            .unwrap();

        let batch = verify(&ready_engine(), &sealed).unwrap();
        assert_eq!(batch.len(), BATCH_SIZE);
    }

    #[test]
    fn test_verify_requires_initialized_engine() {
        let engine = InferenceEngine::with_device(EngineConfig::default(), Device::Cpu);
        assert!(matches!(
            verify(&engine, &bundle(5)),
            Err(InferenceError::NotInitialized)
        ));
    }
}
