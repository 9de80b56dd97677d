//! Dual-condition predictor
//!
//! Owns a lazily populated bundle registry and turns raw JSON into a
//! per-model report for one condition, or a differential diagnosis across
//! both.
//!
//! Usage:
//! ```ignore
//! let predictor = DualConditionPredictor::new(config.models.clone());
//! let report = predictor.predict(&input, Some(Condition::HeartDisease))?;
//! ```

use super::ensemble::{aggregate, differential, predict_each, EnsembleMember};
use crate::bundle::{LoadedBundle, ModelBundle};
use crate::config::ModelsConfig;
use crate::error::{Result, RiskError};
use crate::features::{normalize, Schema};
use crate::model::Classifier;
use crate::types::{Condition, ConditionOutcome, ConditionReport, DiagnosisReport, PredictionReport};
use ndarray::Axis;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct DualConditionPredictor {
    models: ModelsConfig,
    bundles: RwLock<HashMap<Condition, Arc<LoadedBundle>>>,
}

impl DualConditionPredictor {
    pub fn new(models: ModelsConfig) -> Self {
        Self {
            models,
            bundles: RwLock::new(HashMap::new()),
        }
    }

    /// Register an already loaded bundle, bypassing the configured path
    pub fn with_bundle(self, loaded: LoadedBundle) -> Self {
        self.bundles
            .write()
            .insert(loaded.bundle.condition, Arc::new(loaded));
        self
    }

    /// Bundle for a condition, loading it on first use
    pub fn bundle(&self, condition: Condition) -> Result<Arc<LoadedBundle>> {
        if let Some(loaded) = self.bundles.read().get(&condition) {
            return Ok(Arc::clone(loaded));
        }

        let path = self.models.path_for(condition)?;
        let loaded = ModelBundle::load(&path)?;
        if loaded.bundle.condition != condition {
            return Err(RiskError::ModelLoad(format!(
                "{} holds a {} bundle, expected {}",
                path.display(),
                loaded.bundle.condition,
                condition
            )));
        }

        let loaded = Arc::new(loaded);
        self.bundles.write().insert(condition, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Drop cached bundles so the next prediction rereads them
    pub fn clear_cache(&self) {
        self.bundles.write().clear();
    }

    pub fn predict(&self, input: &Value, condition: Option<Condition>) -> Result<PredictionReport> {
        match condition {
            Some(condition) => Ok(PredictionReport::Single(self.predict_condition(input, condition)?)),
            None => Ok(PredictionReport::Differential(self.diagnose(input))),
        }
    }

    pub fn predict_condition(&self, input: &Value, condition: Condition) -> Result<ConditionReport> {
        let loaded = self.bundle(condition)?;
        let bundle = &loaded.bundle;

        let schema = Schema::for_condition(condition, &bundle.feature_names);
        let record = normalize(input, &schema)?;
        debug!(%condition, fields = record.len(), "Normalized input");

        let row = bundle.encoder.encode(&record)?;
        let x = bundle.scaler.transform(&row.insert_axis(Axis(0)))?;

        let members: Vec<EnsembleMember<'_>> = bundle
            .models
            .iter()
            .map(|m| EnsembleMember {
                name: &m.name,
                model: m.model.as_ref().map(|model| model as &dyn Classifier),
                test_score: m.performance.test_score,
                training_error: m.performance.error.as_deref(),
            })
            .collect();

        let models = predict_each(&members, &x);
        let ensemble = aggregate(&models);
        debug!(%condition, ?ensemble, "Ensemble computed");

        Ok(ConditionReport { models, ensemble })
    }

    /// Run both conditions; a failure on one side is reported, not raised
    pub fn diagnose(&self, input: &Value) -> DiagnosisReport {
        let outcome = |condition| match self.predict_condition(input, condition) {
            Ok(report) => ConditionOutcome::Report(report),
            Err(e) => ConditionOutcome::Failed {
                error: e.to_string(),
            },
        };

        let heart_disease = outcome(Condition::HeartDisease);
        let gastric_cancer = outcome(Condition::GastricCancer);
        let differential_diagnosis = differential(&heart_disease, &gastric_cancer);

        DiagnosisReport {
            heart_disease,
            gastric_cancer,
            differential_diagnosis,
        }
    }
}
