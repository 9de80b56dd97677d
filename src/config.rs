//! Configuration
//!
//! Loaded from an optional TOML file, then overridden by `DUAL_RISK_*`
//! environment variables (`__` separates nested keys, e.g.
//! `DUAL_RISK_SERVER__PORT=8080`). A `.env` file is read first.

use crate::error::{Result, RiskError};
use crate::types::Condition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("DUAL_RISK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.training.validate()?;
        Ok(config)
    }
}

/// Where trained bundles live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: String,
    #[serde(default = "default_heart_bundle")]
    pub heart_disease: String,
    #[serde(default = "default_gastric_bundle")]
    pub gastric_cancer: String,
}

impl ModelsConfig {
    /// Bundle path for a condition, with `~` and `$VARS` expanded
    pub fn path_for(&self, condition: Condition) -> Result<PathBuf> {
        let file = match condition {
            Condition::HeartDisease => &self.heart_disease,
            Condition::GastricCancer => &self.gastric_cancer,
        };
        let dir = expand(&self.dir)?;
        let file = expand(file)?;
        Ok(PathBuf::from(dir).join(file))
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            heart_disease: default_heart_bundle(),
            gastric_cancer: default_gastric_bundle(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for scoring
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(RiskError::Config(format!(
                "training.test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HS256 secret; when unset the API is open
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jwt_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            enabled: true,
        }
    }
}

fn expand(s: &str) -> Result<String> {
    shellexpand::full(s)
        .map(|c| c.into_owned())
        .map_err(|e| RiskError::Config(format!("Cannot expand '{}': {}", s, e)))
}

fn default_models_dir() -> String {
    "models".to_string()
}

fn default_heart_bundle() -> String {
    "heart_disease_ensemble.json".to_string()
}

fn default_gastric_bundle() -> String {
    "gastric_cancer_ensemble.json".to_string()
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite://predictions.db".to_string()
}

fn default_true() -> bool {
    true
}
