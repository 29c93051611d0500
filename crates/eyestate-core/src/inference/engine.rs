//! The eye-state inference engine.

use std::path::Path;

use candle_core::Device;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use super::device::inference_device;
use super::loader::{load_labels, load_safetensors};
use super::network::{MultiScaleEyeNet, ScoringGraph};
use crate::domain::{EyeTensors, ScoreVector};
use crate::error::InferenceError;

/// Default number of eye-state classes.
pub const DEFAULT_NUM_CLASSES: usize = 7;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of each per-eye distribution.
    pub num_classes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }
}

struct Ready {
    graph: Box<dyn ScoringGraph>,
    labels: Vec<String>,
}

/// Scores eye pairs with a graph loaded exactly once.
pub struct InferenceEngine {
    config: EngineConfig,
    device: Device,
    ready: OnceCell<Ready>,
}

impl InferenceEngine {
    /// Creates an uninitialized engine on the best available device.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_device(config, inference_device())
    }

    /// Creates an uninitialized engine on `device`.
    #[must_use]
    pub fn with_device(config: EngineConfig, device: Device) -> Self {
        Self {
            config,
            device,
            ready: OnceCell::new(),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads weights and labels.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::AlreadyInitialized`] on a second call and
    /// [`InferenceError::Asset`] if either file cannot be loaded.
    pub fn initialize(
        &self,
        model_path: impl AsRef<Path>,
        labels_path: impl AsRef<Path>,
    ) -> Result<(), InferenceError> {
        if self.is_ready() {
            return Err(InferenceError::AlreadyInitialized);
        }
        let (model_path, labels_path) = (model_path.as_ref(), labels_path.as_ref());
        info!("Loading eye-state model from {}", model_path.display());

        let vb =
            load_safetensors(model_path, &self.device).map_err(|e| asset_error(model_path, e))?;
        let graph = MultiScaleEyeNet::new(vb, self.config.num_classes)
            .map_err(|e| asset_error(model_path, e))?;
        let labels = load_labels(labels_path).map_err(|e| asset_error(labels_path, e))?;

        self.initialize_with(Box::new(graph), labels)
    }

    /// Installs an already built graph.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::AlreadyInitialized`] on a second call and
    /// [`InferenceError::ClassCount`] if the graph's class count differs
    /// from the configuration.
    pub fn initialize_with(
        &self,
        graph: Box<dyn ScoringGraph>,
        labels: Vec<String>,
    ) -> Result<(), InferenceError> {
        if graph.num_classes() != self.config.num_classes {
            return Err(InferenceError::ClassCount {
                expected: self.config.num_classes,
                actual: graph.num_classes(),
            });
        }
        if labels.len() != self.config.num_classes {
            warn!(
                "{} labels for {} classes",
                labels.len(),
                self.config.num_classes
            );
        }
        self.ready
            .set(Ready { graph, labels })
            .map_err(|_| InferenceError::AlreadyInitialized)?;
        info!("Inference engine ready");
        Ok(())
    }

    /// True once [`Self::initialize`] has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    /// Loaded labels, empty before initialization.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        self.ready.get().map_or(&[], |r| r.labels.as_slice())
    }

    /// Scores one eye pair: the elementwise sum of the right and left distributions.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::NotInitialized`] before initialization,
    /// [`InferenceError::ClassCount`] if an output has the wrong length, or
    /// [`InferenceError::Failure`] if execution fails.
    pub fn score_eyes(&self, inputs: &EyeTensors) -> Result<ScoreVector, InferenceError> {
        let ready = self.ready.get().ok_or(InferenceError::NotInitialized)?;
        let [right, left] = ready.graph.run(inputs)?;

        for output in [&right, &left] {
            if output.len() != self.config.num_classes {
                return Err(InferenceError::ClassCount {
                    expected: self.config.num_classes,
                    actual: output.len(),
                });
            }
        }
        let scores = ScoreVector::sum(&right, &left).ok_or(InferenceError::ClassCount {
            expected: right.len(),
            actual: left.len(),
        })?;
        debug!("Scores: {:?}", scores.as_slice());
        Ok(scores)
    }

    /// Label of the highest score, if labels cover it.
    #[must_use]
    pub fn top_label(&self, scores: &ScoreVector) -> Option<&str> {
        scores
            .argmax()
            .and_then(|i| self.labels().get(i))
            .map(String::as_str)
    }
}

fn asset_error(path: &Path, source: impl Into<anyhow::Error>) -> InferenceError {
    InferenceError::Asset {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FixedGraph {
        right: Vec<f32>,
        left: Vec<f32>,
    }

    impl ScoringGraph for FixedGraph {
        fn num_classes(&self) -> usize {
            self.right.len()
        }

        fn run(&self, _: &EyeTensors) -> Result<[Vec<f32>; 2], InferenceError> {
            Ok([self.right.clone(), self.left.clone()])
        }
    }

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class{i}")).collect()
    }

    fn engine() -> InferenceEngine {
        InferenceEngine::with_device(EngineConfig::default(), Device::Cpu)
    }

    #[test]
    fn test_score_before_initialize() {
        let result = engine().score_eyes(&EyeTensors::zeros());
        assert!(matches!(result, Err(InferenceError::NotInitialized)));
    }

    #[test]
    fn test_second_initialize_rejected() {
        let engine = engine();
        let graph = || {
            Box::new(FixedGraph {
                right: vec![0.0; 7],
                left: vec![0.0; 7],
            })
        };
        engine.initialize_with(graph(), labels(7)).unwrap();
        assert!(matches!(
            engine.initialize_with(graph(), labels(7)),
            Err(InferenceError::AlreadyInitialized)
        ));
        assert!(matches!(
            engine.initialize("/nonexistent/model", "/nonexistent/labels"),
            Err(InferenceError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_scores_are_elementwise_sum() {
        let engine = engine();
        let right = vec![0.1, 0.2, 0.3, 0.1, 0.1, 0.1, 0.1];
        let left = vec![0.4, 0.0, 0.1, 0.2, 0.1, 0.1, 0.1];
        engine
            .initialize_with(
                Box::new(FixedGraph {
                    right: right.clone(),
                    left: left.clone(),
                }),
                labels(7),
            )
            .unwrap();

        let scores = engine.score_eyes(&EyeTensors::zeros()).unwrap();
        for ((s, r), l) in scores.as_slice().iter().zip(&right).zip(&left) {
            assert!((s - (r + l)).abs() < 1e-6);
        }
        assert_eq!(engine.top_label(&scores), Some("class0"));
    }

    #[test]
    fn test_class_count_mismatch_rejected() {
        let result = engine().initialize_with(
            Box::new(FixedGraph {
                right: vec![0.5; 3],
                left: vec![0.5; 3],
            }),
            labels(3),
        );
        assert!(matches!(
            result,
            Err(InferenceError::ClassCount {
                expected: 7,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_missing_model_is_asset_error() {
        let result = engine().initialize(
            "/nonexistent/eye_state.safetensors",
            "/nonexistent/labels.txt",
        );
        assert!(matches!(result, Err(InferenceError::Asset { .. })));
    }

    #[test]
    fn test_zero_network_scores_two_sevenths() {
        use candle_core::DType;
        use candle_nn::VarBuilder;

        let engine = engine();
        let net = MultiScaleEyeNet::new(VarBuilder::zeros(DType::F32, &Device::Cpu), 7).unwrap();
        engine.initialize_with(Box::new(net), labels(7)).unwrap();

        let scores = engine.score_eyes(&EyeTensors::zeros()).unwrap();
        assert_eq!(scores.len(), 7);
        for s in scores.as_slice() {
            assert!((s - 2.0 / 7.0).abs() < 1e-5);
        }
        let again = engine.score_eyes(&EyeTensors::zeros()).unwrap();
        assert_eq!(scores, again);
    }
}
