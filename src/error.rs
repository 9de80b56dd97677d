//! Error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors raised by training, persistence and inference
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid condition type: {0}. Must be 'heart_disease' or 'gastric_cancer'")]
    UnknownCondition(String),

    #[error("Failed to load models: {0}")]
    ModelLoad(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model not fitted")]
    NotFitted,

    #[error("Training error: {0}")]
    Training(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RiskError {
    /// Errors caused by the caller's input rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RiskError::MissingFields(_)
                | RiskError::InvalidValue { .. }
                | RiskError::InvalidInput(_)
                | RiskError::UnknownCondition(_)
        )
    }

    pub(crate) fn invalid_value(field: &str, value: &serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        RiskError::InvalidValue {
            field: field.to_string(),
            value,
        }
    }
}

impl From<config::ConfigError> for RiskError {
    fn from(e: config::ConfigError) -> Self {
        RiskError::Config(e.to_string())
    }
}
