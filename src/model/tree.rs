//! CART decision tree
//!
//! Classification trees store the positive-class fraction in each leaf;
//! regression trees (used by boosting) store the mean target.

use super::{check_columns, check_training_shapes, label_from_proba, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Split quality measure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    Entropy,
    /// Squared error, for regression targets
    Mse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Running sums for one side of a candidate split
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl SideStats {
    fn add(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sq_sum += v * v;
    }

    fn remove(&mut self, v: f64) {
        self.count -= 1;
        self.sum -= v;
        self.sq_sum -= v * v;
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        match criterion {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::Entropy => {
                let h = |p: f64| if p > 0.0 { -p * p.ln() } else { 0.0 };
                h(mean) + h(1.0 - mean)
            }
            Criterion::Mse => (self.sq_sum / n - mean * mean).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<Node>,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all
    pub max_features: Option<usize>,
    pub random_state: u64,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::classifier(Criterion::Gini)
    }
}

impl DecisionTree {
    pub fn classifier(criterion: Criterion) -> Self {
        Self {
            root: None,
            criterion,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            n_features: 0,
        }
    }

    pub fn regressor() -> Self {
        Self::classifier(Criterion::Mse)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on arbitrary real-valued targets (no 0/1 check)
    pub(crate) fn fit_values(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(RiskError::DimensionMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(RiskError::InsufficientData("no training rows".into()));
        }

        self.n_features = x.ncols();
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, y, indices, 0, &mut rng));
        Ok(())
    }

    /// Raw leaf values for each row
    pub(crate) fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(RiskError::NotFitted)?;
        check_columns(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| leaf_value(root, row)).collect())
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map(depth).unwrap_or(0)
    }

    pub fn n_leaves(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map(count).unwrap_or(0)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        let mut stats = SideStats::default();
        for &i in &indices {
            stats.add(y[i]);
        }
        let leaf = Node::Leaf {
            value: stats.sum / stats.count.max(1) as f64,
            n_samples: stats.count,
        };

        let parent_impurity = stats.impurity(self.criterion);
        if indices.len() < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || parent_impurity <= 1e-12
        {
            return leaf;
        }

        let Some((feature, threshold)) = self.best_split(x, y, &indices, stats, parent_impurity, rng)
        else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, feature]] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(x, y, left, depth + 1, rng)),
            right: Box::new(self.build(x, y, right, depth + 1, rng)),
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut features = rand::seq::index::sample(rng, n_features, k.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        total: SideStats,
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in self.candidate_features(x.ncols(), rng) {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left = SideStats::default();
            let mut right = total;

            for w in 0..sorted.len() - 1 {
                let (cur, next) = (sorted[w], sorted[w + 1]);
                left.add(y[cur]);
                right.remove(y[cur]);

                let (v, v_next) = (x[[cur, feature]], x[[next, feature]]);
                if v_next <= v {
                    continue;
                }
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.count as f64 * left.impurity(self.criterion)
                    + right.count as f64 * right.impurity(self.criterion))
                    / n;
                let gain = parent_impurity - weighted;
                if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((feature, (v + v_next) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn leaf_value(mut node: &Node, row: ArrayView1<f64>) -> f64 {
    loop {
        match node {
            Node::Leaf { value, .. } => return *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                node = if row[*feature] <= *threshold { left } else { right };
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        self.fit_values(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_values(x)?.mapv(label_from_proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_values(x)
    }
}
