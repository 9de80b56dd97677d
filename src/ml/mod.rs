//! Inference over trained bundles
//!
//! - Per-model prediction with failure isolation
//! - Ensemble averaging and differential diagnosis
//! - A predictor that lazily loads one bundle per condition

pub mod ensemble;
pub mod predictor;


pub use ensemble::{aggregate, differential, predict_each, EnsembleMember};
pub use predictor::DualConditionPredictor;
