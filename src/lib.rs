//! Dual-Condition Risk Predictor
//!
//! Trains per-condition classifier ensembles for heart disease and gastric
//! cancer, and serves ensemble risk predictions over a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! CSV → Frame (impute) → FeatureEncoder → StandardScaler → 6 classifiers → ModelBundle (JSON)
//!
//! JSON input → normalize (schema) → encode → scale → per-model outcomes → ensemble
//!                                                                    ↘ differential diagnosis
//! ```

pub mod bundle;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod ml;
pub mod model;
pub mod monitor;
pub mod server;
pub mod storage;
pub mod training;
pub mod types;

#[cfg(test)]
mod config_tests;
