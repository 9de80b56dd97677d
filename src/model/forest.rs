//! Bagged random forest of CART trees

use super::tree::{Criterion, DecisionTree};
use super::{check_columns, check_training_shapes, label_from_proba, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(RiskError::Training("random forest needs at least one tree".into()));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let max_features = ((n_features as f64).sqrt().round() as usize).max(1);
        let (random_state, criterion, max_depth) =
            (self.random_state, self.criterion, self.max_depth);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|idx| {
                let seed = random_state.wrapping_add(idx as u64);
                let mut rng = StdRng::seed_from_u64(seed);

                // Bootstrap sample with replacement
                let rows: Vec<usize> = (0..n_samples)
                    .map(|_| rng.random_range(0..n_samples))
                    .collect();
                let x_boot = x.select(Axis(0), &rows);
                let y_boot = y.select(Axis(0), &rows);

                let mut tree = DecisionTree::classifier(criterion)
                    .with_max_features(max_features)
                    .with_random_state(seed);
                tree.max_depth = max_depth;
                tree.fit_values(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_from_proba))
    }

    /// Mean of each tree's leaf class frequency (soft voting)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(RiskError::NotFitted);
        }
        check_columns(self.n_features, x)?;

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_values(x))
            .collect::<Result<Vec<_>>>()?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            total += p;
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_proba_averages_leaf_frequencies() {
        // Duplicate rows with mixed labels keep the depth-1 leaves impure
        let x = array![[0.0], [0.0], [0.0], [1.0], [1.0], [1.0], [1.0], [0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let mut forest = RandomForest::new(5).with_max_depth(1).with_random_state(7);
        forest.fit(&x, &y).unwrap();

        let query = array![[0.0], [1.0]];
        let mut expected = Array1::<f64>::zeros(2);
        for tree in &forest.trees {
            expected += &tree.predict_values(&query).unwrap();
        }
        expected /= forest.n_trees() as f64;

        let proba = forest.predict_proba(&query).unwrap();
        assert_eq!(proba, expected);
        // An impure leaf yields a fraction, not a 0/1 vote
        assert!(forest
            .trees
            .iter()
            .any(|t| t.predict_values(&query).unwrap().iter().any(|&p| p > 0.0 && p < 1.0)));
    }
}
