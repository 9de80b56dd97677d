//! Training pipeline
//!
//! CSV -> target resolution -> imputation -> encoding -> seeded split ->
//! scaling -> one fit per ensemble member. A member that fails to train is
//! kept in the bundle with its error so inference can report it.


use crate::bundle::{ModelBundle, ModelPerformance, NamedModel, FORMAT_VERSION};
use crate::config::TrainingConfig;
use crate::data::{self, Cell, Column, ColumnKind, Frame};
use crate::error::{Result, RiskError};
use crate::features::schema::target_column;
use crate::features::{FeatureEncoder, StandardScaler};
use crate::model::{
    accuracy, BoostingConfig, Classifier, Criterion, DecisionTree, GaussianNaiveBayes,
    GradientBoosting, KnnClassifier, LogisticRegression, RandomForest, TrainedModel,
};
use crate::types::Condition;
use chrono::Utc;
use ndarray::{Array1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Untrained ensemble members for a condition, in reporting order
pub fn ensemble_for(condition: Condition) -> Vec<(&'static str, TrainedModel)> {
    match condition {
        Condition::HeartDisease => vec![
            (
                "Logistic Regression",
                TrainedModel::LogisticRegression(LogisticRegression::new().with_max_iter(100)),
            ),
            ("Naive Bayes", TrainedModel::NaiveBayes(GaussianNaiveBayes::new())),
            (
                "Random Forest",
                TrainedModel::RandomForest(
                    RandomForest::new(20).with_max_depth(5).with_random_state(12),
                ),
            ),
            (
                "Gradient Boosting",
                TrainedModel::GradientBoosting(GradientBoosting::new(BoostingConfig {
                    n_estimators: 25,
                    learning_rate: 0.01,
                    max_depth: 15,
                    subsample: 0.52,
                    colsample: 0.6,
                    min_samples_leaf: 1,
                    random_state: 27,
                })),
            ),
            ("KNN", TrainedModel::Knn(KnnClassifier::new(10))),
            (
                "Decision Tree",
                TrainedModel::DecisionTree(
                    DecisionTree::classifier(Criterion::Entropy).with_max_depth(6),
                ),
            ),
        ],
        Condition::GastricCancer => vec![
            (
                "Logistic Regression",
                TrainedModel::LogisticRegression(LogisticRegression::new().with_max_iter(1000)),
            ),
            ("Naive Bayes", TrainedModel::NaiveBayes(GaussianNaiveBayes::new())),
            (
                "Random Forest",
                TrainedModel::RandomForest(
                    RandomForest::new(100).with_max_depth(10).with_random_state(42),
                ),
            ),
            (
                "Gradient Boosting",
                TrainedModel::GradientBoosting(GradientBoosting::new(BoostingConfig {
                    n_estimators: 100,
                    learning_rate: 0.01,
                    max_depth: 5,
                    subsample: 0.8,
                    colsample: 0.8,
                    min_samples_leaf: 1,
                    random_state: 42,
                })),
            ),
            ("KNN", TrainedModel::Knn(KnnClassifier::new(5))),
            (
                "Decision Tree",
                TrainedModel::DecisionTree(
                    DecisionTree::classifier(Criterion::Gini)
                        .with_max_depth(8)
                        .with_random_state(42),
                ),
            ),
        ],
    }
}

pub struct Trainer {
    condition: Condition,
    config: TrainingConfig,
    members: Vec<(&'static str, TrainedModel)>,
}

impl Trainer {
    pub fn new(condition: Condition, config: TrainingConfig) -> Self {
        Self {
            condition,
            config,
            members: ensemble_for(condition),
        }
    }

    /// Replace the ensemble members
    pub fn with_members(mut self, members: Vec<(&'static str, TrainedModel)>) -> Self {
        self.members = members;
        self
    }

    pub fn train_file<P: AsRef<Path>>(self, path: P) -> Result<ModelBundle> {
        let frame = data::load_csv(path)?;
        self.train(frame)
    }

    pub fn train(self, mut frame: Frame) -> Result<ModelBundle> {
        self.config.validate()?;
        info!(condition = %self.condition, rows = frame.n_rows(), "Training ensemble");

        let target_name = resolve_target(&frame, self.condition)?;
        let target = frame
            .remove_column(&target_name)
            .ok_or_else(|| RiskError::Internal(format!("target column {} vanished", target_name)))?;

        // Rows without a label carry no training signal
        let labelled: Vec<usize> = (0..target.cells.len())
            .filter(|&i| !target.cells[i].is_missing())
            .collect();
        let dropped = target.cells.len() - labelled.len();
        let (mut frame, target) = if dropped > 0 {
            warn!(dropped, column = %target_name, "Dropping rows with missing target");
            let target = Column::new(
                target.name.clone(),
                target.kind,
                labelled.iter().map(|&i| target.cells[i].clone()).collect(),
            );
            (frame.select_rows(&labelled), target)
        } else {
            (frame, target)
        };

        let (y, target_labels) = encode_target(&target)?;

        let imputed = frame.impute();
        if !imputed.is_empty() {
            info!(columns = ?imputed, "Imputed missing feature values");
        }

        let encoder = FeatureEncoder::fit(&frame)?;
        let x = encoder.encode_frame(&frame)?;
        info!(
            features = frame.n_cols(),
            encoded = encoder.n_encoded(),
            "Encoded features"
        );

        let (train_idx, test_idx) =
            split_indices(x.nrows(), self.config.test_fraction, self.config.seed)?;
        let x_train = x.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let y_test = y.select(Axis(0), &test_idx);

        let scaler = StandardScaler::fit(&x_train)?;
        let x_train = scaler.transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;
        info!(train = x_train.nrows(), test = x_test.nrows(), "Split data");

        let mut models = Vec::with_capacity(self.members.len());
        for (name, mut model) in self.members {
            let scored = model.fit(&x_train, &y_train).and_then(|_| {
                let train_score = accuracy(&y_train, &model.predict(&x_train)?);
                let test_score = accuracy(&y_test, &model.predict(&x_test)?);
                Ok((train_score, test_score))
            });

            let named = match scored {
                Ok((train_score, test_score)) => {
                    info!(
                        model = name,
                        train_score,
                        test_score,
                        "Model trained"
                    );
                    NamedModel {
                        name: name.to_string(),
                        model: Some(model),
                        performance: ModelPerformance {
                            train_score: Some(train_score),
                            test_score: Some(test_score),
                            error: None,
                        },
                    }
                }
                Err(e) => {
                    warn!(model = name, error = %e, "Model failed to train");
                    NamedModel {
                        name: name.to_string(),
                        model: None,
                        performance: ModelPerformance {
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    }
                }
            };
            models.push(named);
        }

        if models.iter().all(|m| m.model.is_none()) {
            return Err(RiskError::Training("every model failed to train".into()));
        }

        Ok(ModelBundle {
            format_version: FORMAT_VERSION,
            condition: self.condition,
            trained_at: Utc::now(),
            target_column: target_name,
            target_labels,
            feature_names: encoder.feature_names(),
            encoder,
            scaler,
            models,
        })
    }
}

/// Heart disease requires its target; gastric falls back to the last column
fn resolve_target(frame: &Frame, condition: Condition) -> Result<String> {
    let expected = target_column(condition);
    if frame.column(expected).is_some() {
        return Ok(expected.to_string());
    }
    match condition {
        Condition::GastricCancer => {
            let fallback = frame
                .columns
                .last()
                .map(|c| c.name.clone())
                .ok_or_else(|| RiskError::InsufficientData("CSV has no columns".into()))?;
            warn!(
                expected,
                using = %fallback,
                "Target column not found, using the last column"
            );
            Ok(fallback)
        }
        Condition::HeartDisease => Err(RiskError::MissingFields(vec![expected.to_string()])),
    }
}

/// Map the target to 0/1; returns the original labels when they were not 0/1
fn encode_target(column: &Column) -> Result<(Array1<f64>, Vec<String>)> {
    let (y, labels): (Array1<f64>, Vec<String>) = match column.kind {
        ColumnKind::Numeric => {
            let y: Array1<f64> = column.cells.iter().filter_map(Cell::as_f64).collect();
            if y.iter().any(|&v| v != 0.0 && v != 1.0) {
                return Err(RiskError::Training(format!(
                    "target column {} must be binary (0/1)",
                    column.name
                )));
            }
            (y, Vec::new())
        }
        ColumnKind::Boolean => {
            let y = column
                .cells
                .iter()
                .map(|c| if matches!(c, Cell::Bool(true)) { 1.0 } else { 0.0 })
                .collect();
            (y, vec!["False".to_string(), "True".to_string()])
        }
        ColumnKind::Categorical => {
            let rendered: Vec<String> = column.cells.iter().filter_map(Cell::render).collect();
            let labels: Vec<String> = rendered
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if labels.len() != 2 {
                return Err(RiskError::Training(format!(
                    "target column {} must have exactly two labels, found {}",
                    column.name,
                    labels.len()
                )));
            }
            let y = rendered
                .iter()
                .map(|v| if *v == labels[1] { 1.0 } else { 0.0 })
                .collect();
            (y, labels)
        }
    };

    let positives = y.iter().filter(|&&v| v == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(RiskError::InsufficientData(format!(
            "target column {} has a single class",
            column.name
        )));
    }
    Ok((y, labels))
}

/// Seeded shuffle split; the test side gets `ceil(n * fraction)` rows
pub(crate) fn split_indices(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(RiskError::InsufficientData(format!(
            "{} rows cannot be split with test fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}
