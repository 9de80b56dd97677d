//! Per-model prediction with failure isolation, and ensemble aggregation

use crate::error::{Result, RiskError};
use crate::model::Classifier;
use crate::types::{
    Condition, ConditionOutcome, DifferentialDiagnosis, EnsembleResult, ModelOutcome,
    ModelPrediction,
};
use ndarray::Array2;
use tracing::warn;

/// One ensemble member as seen by inference
#[derive(Clone, Copy)]
pub struct EnsembleMember<'a> {
    pub name: &'a str,
    /// `None` when the model failed to train
    pub model: Option<&'a dyn Classifier>,
    /// Held-out accuracy recorded at training time
    pub test_score: Option<f64>,
    pub training_error: Option<&'a str>,
}

/// Run every member on a single scaled row; a failing member never stops the rest
pub fn predict_each(members: &[EnsembleMember<'_>], x: &Array2<f64>) -> Vec<(String, ModelOutcome)> {
    members
        .iter()
        .map(|member| {
            let outcome = match predict_one(member, x) {
                Ok(prediction) => ModelOutcome::Prediction(prediction),
                Err(e) => {
                    warn!(model = member.name, error = %e, "Model prediction failed");
                    ModelOutcome::failure(e)
                }
            };
            (member.name.to_string(), outcome)
        })
        .collect()
}

fn predict_one(member: &EnsembleMember<'_>, x: &Array2<f64>) -> Result<ModelPrediction> {
    let model = member.model.ok_or_else(|| match member.training_error {
        Some(e) => RiskError::Training(format!("model failed to train: {}", e)),
        None => RiskError::NotFitted,
    })?;

    let label = first(&model.predict(x)?)?;
    let probability = if model.supports_proba() {
        Some(first(&model.predict_proba(x)?)?)
    } else {
        None
    };
    let model_accuracy = member
        .test_score
        .ok_or_else(|| RiskError::Internal(format!("no recorded test score for {}", member.name)))?;

    Ok(ModelPrediction {
        prediction: if label >= 0.5 { 1 } else { 0 },
        probability,
        model_accuracy,
    })
}

fn first(values: &ndarray::Array1<f64>) -> Result<f64> {
    values
        .first()
        .copied()
        .ok_or_else(|| RiskError::Internal("model returned no output".into()))
}

/// Average the members that succeeded with a probability
///
/// The label is the mean vote rounded half to even; `None` when no member
/// qualifies.
pub fn aggregate(outcomes: &[(String, ModelOutcome)]) -> Option<EnsembleResult> {
    let valid: Vec<(&ModelPrediction, f64)> = outcomes
        .iter()
        .filter_map(|(_, o)| o.as_prediction())
        .filter_map(|p| p.probability.map(|prob| (p, prob)))
        .collect();
    if valid.is_empty() {
        return None;
    }

    let n = valid.len() as f64;
    let mean_label = valid.iter().map(|(p, _)| p.prediction as f64).sum::<f64>() / n;
    let probability = valid.iter().map(|(_, prob)| prob).sum::<f64>() / n;
    let model_accuracy = valid.iter().map(|(p, _)| p.model_accuracy).sum::<f64>() / n;

    Some(EnsembleResult {
        prediction: mean_label.round_ties_even() as u8,
        probability,
        model_accuracy,
    })
}

/// Compare two condition outcomes; `None` unless both carry an ensemble
pub fn differential(
    heart: &ConditionOutcome,
    gastric: &ConditionOutcome,
) -> Option<DifferentialDiagnosis> {
    let p_heart = heart.ensemble_probability()?;
    let p_gastric = gastric.ensemble_probability()?;
    let total = p_heart + p_gastric;

    let (most_likely_condition, winner) = if p_heart > p_gastric {
        (Condition::HeartDisease, p_heart)
    } else {
        (Condition::GastricCancer, p_gastric)
    };
    let confidence = if total > 0.0 { winner / total } else { 0.5 };

    Some(DifferentialDiagnosis {
        most_likely_condition,
        confidence,
    })
}
