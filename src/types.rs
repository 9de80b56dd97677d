//! Core types shared by training, inference and the API

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RiskError;

/// Condition a bundle is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    HeartDisease,
    GastricCancer,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::HeartDisease, Condition::GastricCancer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::HeartDisease => "heart_disease",
            Condition::GastricCancer => "gastric_cancer",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heart_disease" | "heart" => Ok(Condition::HeartDisease),
            "gastric_cancer" | "gastric" => Ok(Condition::GastricCancer),
            _ => Err(RiskError::UnknownCondition(s.to_string())),
        }
    }
}

/// A single model's successful output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Predicted class (0 or 1)
    pub prediction: u8,
    /// P(class = 1), absent for models without probability output
    pub probability: Option<f64>,
    /// Held-out accuracy recorded at training time
    pub model_accuracy: f64,
}

/// Per-model result: a prediction or the captured failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    Prediction(ModelPrediction),
    Failure { error: String },
}

impl ModelOutcome {
    pub fn failure(error: impl fmt::Display) -> Self {
        ModelOutcome::Failure {
            error: error.to_string(),
        }
    }

    pub fn as_prediction(&self) -> Option<&ModelPrediction> {
        match self {
            ModelOutcome::Prediction(p) => Some(p),
            ModelOutcome::Failure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ModelOutcome::Failure { .. })
    }
}

/// Averaged output over the models that produced a probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub prediction: u8,
    pub probability: f64,
    pub model_accuracy: f64,
}

/// Outcome of every model for one condition, in bundle order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionReport {
    pub models: Vec<(String, ModelOutcome)>,
    pub ensemble: Option<EnsembleResult>,
}

impl ConditionReport {
    pub fn model(&self, name: &str) -> Option<&ModelOutcome> {
        self.models.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn failed_models(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .filter(|(_, o)| o.is_failure())
            .map(|(n, _)| n.as_str())
    }
}

/// Flat object: one key per model, plus `ensemble` when present
impl Serialize for ConditionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.models.len() + usize::from(self.ensemble.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, outcome) in &self.models {
            map.serialize_entry(name, outcome)?;
        }
        if let Some(ensemble) = &self.ensemble {
            map.serialize_entry("ensemble", ensemble)?;
        }
        map.end()
    }
}

/// Per-condition result inside a differential diagnosis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionOutcome {
    Report(ConditionReport),
    Failed { error: String },
}

impl ConditionOutcome {
    pub fn ensemble_probability(&self) -> Option<f64> {
        match self {
            ConditionOutcome::Report(r) => r.ensemble.map(|e| e.probability),
            ConditionOutcome::Failed { .. } => None,
        }
    }
}

/// Which condition is more likely and by how much
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub most_likely_condition: Condition,
    pub confidence: f64,
}

/// Result of predicting without a condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisReport {
    pub heart_disease: ConditionOutcome,
    pub gastric_cancer: ConditionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential_diagnosis: Option<DifferentialDiagnosis>,
}

/// Top-level prediction result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionReport {
    Single(ConditionReport),
    Differential(DiagnosisReport),
}

impl PredictionReport {
    /// Label stored alongside history records
    pub fn condition_label(&self, condition: Option<Condition>) -> &'static str {
        match (self, condition) {
            (PredictionReport::Single(_), Some(c)) => c.as_str(),
            _ => "differential",
        }
    }

    /// Ensemble output of a single-condition report
    pub fn ensemble(&self) -> Option<EnsembleResult> {
        match self {
            PredictionReport::Single(r) => r.ensemble,
            PredictionReport::Differential(_) => None,
        }
    }
}
