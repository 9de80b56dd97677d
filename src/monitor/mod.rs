//! In-memory prediction statistics

use crate::types::{Condition, ConditionOutcome, ConditionReport, PredictionReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::RwLock;

/// Prediction monitor
pub struct PredictionMonitor {
    events: RwLock<VecDeque<PredictionEvent>>,
    totals: RwLock<Totals>,
    max_history: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionEvent {
    pub timestamp: DateTime<Utc>,
    /// Condition name or `differential`
    pub condition: String,
    pub ensemble_probability: Option<f64>,
    pub failed_models: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct Totals {
    predictions: usize,
    errors: usize,
    by_condition: BTreeMap<String, usize>,
    model_failures: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionStats {
    pub total_predictions: usize,
    pub total_errors: usize,
    pub by_condition: BTreeMap<String, usize>,
    /// Keyed by `condition/model`
    pub model_failures: BTreeMap<String, usize>,
    pub recent: Vec<PredictionEvent>,
}

fn failed_in(condition: Condition, report: &ConditionReport) -> Vec<String> {
    report
        .failed_models()
        .map(|name| format!("{}/{}", condition, name))
        .collect()
}

impl PredictionMonitor {
    pub fn new(max_history: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(max_history)),
            totals: RwLock::new(Totals::default()),
            max_history,
        }
    }

    pub async fn record_report(&self, condition: Option<Condition>, report: &PredictionReport) {
        let label = report.condition_label(condition).to_string();
        let failed_models = match (report, condition) {
            (PredictionReport::Single(r), Some(c)) => failed_in(c, r),
            (PredictionReport::Differential(d), _) => {
                let mut failed = Vec::new();
                for (c, outcome) in [
                    (Condition::HeartDisease, &d.heart_disease),
                    (Condition::GastricCancer, &d.gastric_cancer),
                ] {
                    if let ConditionOutcome::Report(r) = outcome {
                        failed.extend(failed_in(c, r));
                    }
                }
                failed
            }
            (PredictionReport::Single(_), None) => Vec::new(),
        };

        {
            let mut totals = self.totals.write().await;
            totals.predictions += 1;
            *totals.by_condition.entry(label.clone()).or_default() += 1;
            for name in &failed_models {
                *totals.model_failures.entry(name.clone()).or_default() += 1;
            }
        }

        self.push(PredictionEvent {
            timestamp: Utc::now(),
            condition: label,
            ensemble_probability: report.ensemble().map(|e| e.probability),
            failed_models,
            error: None,
        })
        .await;
    }

    pub async fn record_error(&self, condition: Option<Condition>, error: &str) {
        let label = condition.map(|c| c.as_str()).unwrap_or("differential");
        self.totals.write().await.errors += 1;
        self.push(PredictionEvent {
            timestamp: Utc::now(),
            condition: label.to_string(),
            ensemble_probability: None,
            failed_models: Vec::new(),
            error: Some(error.to_string()),
        })
        .await;
    }

    async fn push(&self, event: PredictionEvent) {
        let mut events = self.events.write().await;
        if events.len() >= self.max_history {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn get_stats(&self) -> PredictionStats {
        let totals = self.totals.read().await;
        let events = self.events.read().await;
        PredictionStats {
            total_predictions: totals.predictions,
            total_errors: totals.errors,
            by_condition: totals.by_condition.clone(),
            model_failures: totals.model_failures.clone(),
            recent: events.iter().rev().cloned().collect(),
        }
    }

    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;
        tracing::info!(
            "Predictions: {} served, {} errors, {} model failures",
            stats.total_predictions,
            stats.total_errors,
            stats.model_failures.values().sum::<usize>()
        );
    }
}
