//! Scores produced by the network and batches of verified eye pairs.

use std::time::Duration;

use serde::Serialize;

use super::EyeBitmap;

/// Number of eye pairs verified per batch.
pub const BATCH_SIZE: usize = 5;

/// Per-class scores. For a verification this is the sum of both eyes' softmax outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    /// Wraps raw scores.
    #[must_use]
    pub const fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    /// Elementwise sum of two equally long vectors; `None` if lengths differ.
    #[must_use]
    pub fn sum(a: &[f32], b: &[f32]) -> Option<Self> {
        (a.len() == b.len()).then(|| Self(a.iter().zip(b).map(|(x, y)| x + y).collect()))
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Scores by class index.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Index of the highest score; the first wins on ties.
    #[must_use]
    pub fn argmax(&self) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, _)| i)
    }
}

/// Outcome of scoring one eye pair.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Aggregate score vector.
    pub scores: ScoreVector,
    /// Left eye bitmap that was scored.
    pub left: EyeBitmap,
    /// Right eye bitmap that was scored.
    pub right: EyeBitmap,
    /// Time since the batch started when this entry finished.
    pub elapsed: Duration,
}

/// Five scored pairs plus the total verification time.
#[derive(Debug, Clone)]
pub struct ResultBatch {
    entries: Vec<InferenceResult>,
    elapsed: Duration,
}

impl ResultBatch {
    /// Bundles scored entries with the elapsed wall time.
    #[must_use]
    pub const fn new(entries: Vec<InferenceResult>, elapsed: Duration) -> Self {
        Self { entries, elapsed }
    }

    /// Scored entries in capture order.
    #[must_use]
    pub fn entries(&self) -> &[InferenceResult] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the batch holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total wall time spent verifying.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total verification time in hundredths of a second.
    #[must_use]
    pub fn verification_time(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis() / 10).unwrap_or(u64::MAX)
    }

    /// Consumes the batch, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<InferenceResult> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_requires_equal_lengths() {
        let summed = ScoreVector::sum(&[0.1, 0.2], &[0.3, 0.4]);
        assert_eq!(summed.map(|s| s.len()), Some(2));
        assert!(ScoreVector::sum(&[0.1], &[0.3, 0.4]).is_none());
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        let scores = ScoreVector::new(vec![0.2, 0.5, 0.5, 0.1]);
        assert_eq!(scores.argmax(), Some(1));
        assert_eq!(ScoreVector::new(vec![]).argmax(), None);
    }

    #[test]
    fn test_verification_time_in_hundredths() {
        let batch = ResultBatch::new(vec![], Duration::from_millis(1234));
        assert_eq!(batch.verification_time(), 123);
    }
}
