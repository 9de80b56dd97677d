//! Gradient-boosted trees with log-loss
//!
//! Each round fits a regression tree to the residuals `y - p` on a row and
//! column subsample, then adds its output to the running log-odds.

use super::tree::DecisionTree;
use super::{check_columns, check_training_shapes, label_from_proba, sigmoid, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows drawn (without replacement) per round
    pub subsample: f64,
    /// Fraction of columns drawn per round
    pub colsample: f64,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            colsample: 1.0,
            min_samples_leaf: 1,
            random_state: 0,
        }
    }
}

/// One boosting round: the columns it saw and the tree fitted on them
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stage {
    columns: Vec<usize>,
    tree: DecisionTree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub config: BoostingConfig,
    base_score: f64,
    stages: Vec<Stage>,
    n_features: usize,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(BoostingConfig::default())
    }
}

impl GradientBoosting {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            stages: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut scores = Array1::from_elem(x.nrows(), self.base_score);
        for stage in &self.stages {
            let view = x.select(Axis(1), &stage.columns);
            scores = scores + stage.tree.predict_values(&view)? * self.config.learning_rate;
        }
        Ok(scores)
    }
}

fn sample_size(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).round() as usize).clamp(1, total)
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        let cfg = &self.config;
        if !(cfg.subsample > 0.0 && cfg.subsample <= 1.0) || !(cfg.colsample > 0.0 && cfg.colsample <= 1.0)
        {
            return Err(RiskError::Training(
                "subsample and colsample must be in (0, 1]".into(),
            ));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut rng = StdRng::seed_from_u64(cfg.random_state);

        let positive_rate = (y.sum() / n_samples as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();
        let mut scores = Array1::from_elem(n_samples, base_score);
        let mut stages = Vec::with_capacity(cfg.n_estimators);

        for round in 0..cfg.n_estimators {
            let residuals = y - &scores.mapv(sigmoid);

            let mut rows =
                rand::seq::index::sample(&mut rng, n_samples, sample_size(n_samples, cfg.subsample))
                    .into_vec();
            rows.sort_unstable();
            let mut columns =
                rand::seq::index::sample(&mut rng, n_features, sample_size(n_features, cfg.colsample))
                    .into_vec();
            columns.sort_unstable();

            let x_round = x.select(Axis(0), &rows).select(Axis(1), &columns);
            let r_round = residuals.select(Axis(0), &rows);

            let mut tree = DecisionTree::regressor()
                .with_max_depth(cfg.max_depth)
                .with_random_state(cfg.random_state.wrapping_add(round as u64));
            tree.min_samples_leaf = cfg.min_samples_leaf;
            tree.fit_values(&x_round, &r_round)?;

            let update = tree.predict_values(&x.select(Axis(1), &columns))?;
            scores = scores + update * cfg.learning_rate;
            stages.push(Stage { columns, tree });
        }

        debug!(
            rounds = stages.len(),
            base_score, "Gradient boosting fitted"
        );

        self.base_score = base_score;
        self.stages = stages;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_from_proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(RiskError::NotFitted);
        }
        check_columns(self.n_features, x)?;
        Ok(self.raw_scores(x)?.mapv(sigmoid))
    }
}
