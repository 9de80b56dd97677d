//! Persisted model bundle: models plus preprocessing artifacts for one condition

use crate::error::{Result, RiskError};
use crate::features::{FeatureEncoder, StandardScaler};
use crate::model::TrainedModel;
use crate::types::Condition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FORMAT_VERSION: u32 = 1;

/// Scores recorded at training time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub train_score: Option<f64>,
    pub test_score: Option<f64>,
    /// Set when the model failed to train
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedModel {
    pub name: String,
    /// `None` when training failed
    pub model: Option<TrainedModel>,
    pub performance: ModelPerformance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub condition: Condition,
    pub trained_at: DateTime<Utc>,
    pub target_column: String,
    /// Original labels mapped to 0 and 1, when the target was not already 0/1
    #[serde(default)]
    pub target_labels: Vec<String>,
    /// Source columns before encoding, in training order
    pub feature_names: Vec<String>,
    pub encoder: FeatureEncoder,
    pub scaler: StandardScaler,
    pub models: Vec<NamedModel>,
}

impl ModelBundle {
    pub fn encoded_feature_names(&self) -> &[String] {
        self.encoder.encoded_feature_names()
    }

    /// Write as pretty JSON, creating parent directories; returns the fingerprint
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, &bytes)?;

        let fingerprint = fingerprint(&bytes);
        info!(
            condition = %self.condition,
            path = %path.display(),
            fingerprint = %fingerprint,
            "Saved model bundle"
        );
        Ok(fingerprint)
    }

    /// Read a bundle; every failure surfaces as `ModelLoad`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedBundle> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| RiskError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let bundle: ModelBundle = serde_json::from_slice(&bytes)
            .map_err(|e| RiskError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        if bundle.format_version != FORMAT_VERSION {
            return Err(RiskError::ModelLoad(format!(
                "{}: unsupported format version {}",
                path.display(),
                bundle.format_version
            )));
        }
        if bundle.scaler.n_features() != bundle.encoder.n_encoded() {
            return Err(RiskError::ModelLoad(format!(
                "{}: scaler expects {} features but encoder produces {}",
                path.display(),
                bundle.scaler.n_features(),
                bundle.encoder.n_encoded()
            )));
        }

        let fingerprint = fingerprint(&bytes);
        info!(
            condition = %bundle.condition,
            path = %path.display(),
            fingerprint = %fingerprint,
            models = bundle.models.len(),
            "Loaded model bundle"
        );

        Ok(LoadedBundle {
            bundle,
            fingerprint,
            path: path.to_path_buf(),
        })
    }
}

/// A bundle with the file it came from
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub bundle: ModelBundle,
    /// Lowercase hex SHA-256 of the file bytes
    pub fingerprint: String,
    pub path: PathBuf,
}

pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Per-model line of a bundle summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub trained: bool,
    #[serde(flatten)]
    pub performance: ModelPerformance,
}

/// What a loaded bundle contains, without the fitted parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleSummary {
    pub condition: Condition,
    pub path: String,
    pub fingerprint: String,
    pub trained_at: DateTime<Utc>,
    pub target_column: String,
    pub feature_names: Vec<String>,
    pub encoded_features: usize,
    pub models: Vec<ModelSummary>,
}

impl LoadedBundle {
    pub fn summary(&self) -> BundleSummary {
        let bundle = &self.bundle;
        BundleSummary {
            condition: bundle.condition,
            path: self.path.display().to_string(),
            fingerprint: self.fingerprint.clone(),
            trained_at: bundle.trained_at,
            target_column: bundle.target_column.clone(),
            feature_names: bundle.feature_names.clone(),
            encoded_features: bundle.encoded_feature_names().len(),
            models: bundle
                .models
                .iter()
                .map(|m| ModelSummary {
                    name: m.name.clone(),
                    trained: m.model.is_some(),
                    performance: m.performance.clone(),
                })
                .collect(),
        }
    }
}
