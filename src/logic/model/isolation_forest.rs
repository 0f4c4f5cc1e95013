//! Isolation Forest Detector
//!
//! Primary detector. Anomalies are isolated by fewer random splits, so their
//! average path length across the ensemble is short.
//!
//! Score pipeline:
//! 1. standardize the batch
//! 2. `score_samples = -2^(-E[h(x)] / c(max_samples))`
//! 3. `decision = score_samples - offset`, offset fitted at the
//!    `contamination` percentile of the training scores
//! 4. min-max rescale of the decision values: batch minimum -> 1.0,
//!    batch maximum -> 0.0
//!
//! The flag is the ensemble's own `decision < 0`, unless a score threshold
//! is configured.

use std::path::Path;

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONTAMINATION, DEFAULT_ESTIMATORS, DEFAULT_MAX_SAMPLES, DEFAULT_RANDOM_SEED};
use crate::error::{PipelineError, PipelineResult};
use crate::logic::explain;
use crate::logic::features::FeatureVector;

use super::persistence;
use super::scaler::StandardScaler;
use super::threshold::percentile;
use super::{AnomalyDetector, ModelKind, Prediction};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Features spanning less than this inside a node are treated as constant
const FEATURE_THRESHOLD: f64 = 1e-7;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestConfig {
    /// Expected proportion of anomalies, (0, 0.5]
    pub contamination: f64,
    /// Trees in the ensemble
    pub n_estimators: usize,
    /// Per-tree sample cap; each tree draws `min(max_samples, n)` rows
    pub max_samples: usize,
    pub random_seed: u64,
    /// Replaces the ensemble decision with `score >= threshold`
    pub score_threshold: Option<f64>,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            n_estimators: DEFAULT_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
            random_seed: DEFAULT_RANDOM_SEED,
            score_threshold: None,
        }
    }
}

impl IsolationForestConfig {
    fn validate(&self) -> PipelineResult<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(PipelineError::InvalidConfig(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators and max_samples must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ISOLATION TREE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Flat arena of nodes, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &Array2<f64>, sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, sample, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &Array2<f64>,
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: indices.len() });

        if depth >= height_limit || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = data[[i, feature]];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo + FEATURE_THRESHOLD).then_some((feature, lo, hi))
            })
            .collect();

        let Some(&(feature, lo, hi)) = candidates.choose(rng) else {
            return id;
        };

        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data[[i, feature]] <= threshold);

        let left = self.grow(data, left, depth + 1, height_limit, rng);
        let right = self.grow(data, right, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    /// Depth reached by `row`, corrected by `c(leaf size)`
    fn path_length(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// FITTED STATE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedForest {
    scaler: StandardScaler,
    trees: Vec<IsolationTree>,
    /// Rows drawn per tree
    max_samples: usize,
    /// Decision offset from contamination
    offset: f64,
    contamination: f64,
}

impl FittedForest {
    /// Higher = more normal, always negative
    fn score_samples(&self, scaled: &Array2<f64>) -> Vec<f64> {
        let denominator = average_path_length(self.max_samples);
        let n_trees = self.trees.len() as f64;

        scaled
            .rows()
            .into_iter()
            .map(|row| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                let exponent = if denominator > 0.0 { mean_depth / denominator } else { 1.0 };
                -(2f64.powf(-exponent))
            })
            .collect()
    }

    fn decision_function(&self, scaled: &Array2<f64>) -> Vec<f64> {
        self.score_samples(scaled)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct IsolationForestDetector {
    config: IsolationForestConfig,
    state: Option<FittedForest>,
}

impl IsolationForestDetector {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config, state: None }
    }

    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }

    fn fitted(&self) -> PipelineResult<&FittedForest> {
        self.state.as_ref().ok_or(PipelineError::NotFitted)
    }

    /// Raw ensemble decision values, negative = flagged by the ensemble
    pub fn decision_function(&self, features: &Array2<f64>) -> PipelineResult<Vec<f64>> {
        let state = self.fitted()?;
        let scaled = state.scaler.transform(features)?;
        Ok(state.decision_function(&scaled))
    }
}

impl Default for IsolationForestDetector {
    fn default() -> Self {
        Self::new(IsolationForestConfig::default())
    }
}

/// Batch minimum -> 1.0, maximum -> 0.0, zero spread -> all 0
fn rescale_inverted(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    if !(spread > 0.0) {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|v| 1.0 - (v - min) / spread).collect()
}

impl AnomalyDetector for IsolationForestDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::IsolationForest
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fit(&mut self, features: &Array2<f64>) -> PipelineResult<()> {
        self.config.validate()?;
        let (scaler, scaled) = StandardScaler::fit_transform(features)?;

        let n = scaled.nrows();
        let max_samples = self.config.max_samples.min(n);
        let height_limit = (max_samples as f64).log2().ceil().max(0.0) as usize;
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);

        let trees: Vec<IsolationTree> = (0..self.config.n_estimators)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, max_samples).into_vec();
                IsolationTree::build(&scaled, sample, height_limit, &mut rng)
            })
            .collect();

        let mut state = FittedForest {
            scaler,
            trees,
            max_samples,
            offset: 0.0,
            contamination: self.config.contamination,
        };
        let training_scores = state.score_samples(&scaled);
        state.offset = percentile(&training_scores, 100.0 * self.config.contamination)
            .ok_or(PipelineError::EmptyBatch)?;

        log::info!(
            "Isolation forest fitted: {} trees, {} rows, max_samples={}, offset={:.4}",
            state.trees.len(),
            n,
            max_samples,
            state.offset
        );

        self.state = Some(state);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> PipelineResult<Prediction> {
        let raw = self.decision_function(features)?;
        let scores = rescale_inverted(&raw);

        let flags = raw.iter().map(|&d| d < 0.0).collect();

        let mut prediction = Prediction { scores, flags };
        if let Some(threshold) = self.config.score_threshold {
            prediction.apply_threshold(threshold);
        }
        Ok(prediction)
    }

    fn generate_explanation(
        &self,
        features: &FeatureVector,
        score: f64,
        is_suspicious: bool,
    ) -> PipelineResult<String> {
        self.fitted()?;
        Ok(explain::explain_isolation_forest(features, score, is_suspicious))
    }

    fn save(&self, path: &Path) -> PipelineResult<()> {
        persistence::save_state(self.kind(), self.fitted()?, path)
    }

    fn load(&mut self, path: &Path) -> PipelineResult<()> {
        let state: FittedForest = persistence::load_state(self.kind(), path)?;
        self.config.contamination = state.contamination;
        self.state = Some(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Tight cluster plus one far point
    fn clustered(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n + 1, 3), |(i, j)| {
            if i == n {
                10.0
            } else {
                ((i * 7 + j * 3) % 5) as f64 * 0.1
            }
        })
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!(c256 > 10.0 && c256 < 11.0);
    }

    #[test]
    fn test_outlier_gets_top_score() {
        let data = clustered(30);
        let mut detector = IsolationForestDetector::default();
        let prediction = detector.fit_predict(&data).unwrap();

        assert_eq!(prediction.scores[30], 1.0);
        assert!(prediction.flags[30]);
        assert!(prediction.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_contamination_bounds_flag_count() {
        let data = clustered(39);
        let mut detector = IsolationForestDetector::default();
        let prediction = detector.fit_predict(&data).unwrap();

        // 10% of 40 rows sit below the offset, ties aside
        assert!(prediction.suspicious_count() >= 1);
        assert!(prediction.suspicious_count() <= 8);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = clustered(20);
        let a = IsolationForestDetector::default().fit_predict(&data).unwrap();
        let b = IsolationForestDetector::default().fit_predict(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_row_has_zero_score() {
        let data = Array2::from_elem((1, 9), 1.0);
        let mut detector = IsolationForestDetector::default();
        let prediction = detector.fit_predict(&data).unwrap();

        assert_eq!(prediction.scores, vec![0.0]);
        assert_eq!(prediction.flags, vec![false]);
    }

    #[test]
    fn test_threshold_override() {
        let data = clustered(30);
        let config = IsolationForestConfig { score_threshold: Some(0.0), ..Default::default() };
        let prediction = IsolationForestDetector::new(config).fit_predict(&data).unwrap();
        assert!(prediction.flags.iter().all(|&f| f));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let detector = IsolationForestDetector::default();
        let err = detector.predict(&clustered(3)).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted));

        let explain = detector.generate_explanation(&FeatureVector::new(), 0.9, true);
        assert!(matches!(explain, Err(PipelineError::NotFitted)));
    }

    #[test]
    fn test_empty_fit_fails() {
        let mut detector = IsolationForestDetector::default();
        let err = detector.fit(&Array2::zeros((0, 9))).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyBatch));
    }

    #[test]
    fn test_invalid_contamination() {
        let config = IsolationForestConfig { contamination: 0.7, ..Default::default() };
        let err = IsolationForestDetector::new(config).fit(&clustered(5)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_rescale_inverted() {
        assert_eq!(rescale_inverted(&[-0.2, 0.0, 0.2]), vec![1.0, 0.5, 0.0]);
        assert_eq!(rescale_inverted(&[0.3, 0.3]), vec![0.0, 0.0]);
    }
}
