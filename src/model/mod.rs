//! Binary classifiers
//!
//! Every model the ensemble can carry lives here, behind the [`Classifier`]
//! trait. [`TrainedModel`] is the serializable form stored in a bundle.

mod boosting;
mod forest;
mod knn;
mod logistic;
mod naive_bayes;
mod tree;

pub use boosting::{BoostingConfig, GradientBoosting};
pub use forest::RandomForest;
pub use knn::KnnClassifier;
pub use logistic::LogisticRegression;
pub use naive_bayes::GaussianNaiveBayes;
pub use tree::{Criterion, DecisionTree};

use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Trait for binary classifiers over scaled feature matrices
///
/// Labels are `0.0` / `1.0`. `predict_proba` returns P(class = 1) per row.
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Whether `predict_proba` is meaningful for this model
    fn supports_proba(&self) -> bool {
        true
    }
}

/// Serializable union of every classifier kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    NaiveBayes(GaussianNaiveBayes),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    Knn(KnnClassifier),
    DecisionTree(DecisionTree),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::DecisionTree(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::DecisionTree(m) => m,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_proba(x)
    }

    fn supports_proba(&self) -> bool {
        self.inner().supports_proba()
    }
}

/// Fraction of rows where the predicted label matches
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, p)| (*a - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

pub(crate) fn check_training_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(RiskError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(RiskError::InsufficientData("no training rows".into()));
    }
    if x.ncols() == 0 {
        return Err(RiskError::InsufficientData("no feature columns".into()));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(RiskError::Training("labels must be 0 or 1".into()));
    }
    Ok(())
}

pub(crate) fn check_columns(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(RiskError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Class 1 wins only on a strict majority, so ties go to class 0
pub(crate) fn label_from_proba(p: f64) -> f64 {
    if p > 0.5 {
        1.0
    } else {
        0.0
    }
}
