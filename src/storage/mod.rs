//! Prediction history in SQLite

use crate::error::{Result, RiskError};
use crate::types::{Condition, PredictionReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// One served prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Condition name or `differential`
    pub condition: String,
    pub prediction: Option<u8>,
    pub probability: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}

impl PredictionRecord {
    pub fn new(
        user_id: &str,
        condition: Option<Condition>,
        report: &PredictionReport,
    ) -> Result<Self> {
        let ensemble = report.ensemble();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            condition: report.condition_label(condition).to_string(),
            prediction: ensemble.map(|e| e.prediction),
            probability: ensemble.map(|e| e.probability),
            created_at: Utc::now(),
            payload: serde_json::to_value(report)?,
        })
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and its schema
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = if url.contains(":memory:") {
            // Every in-memory connection is a separate database, so keep exactly one alive
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        }
        .connect_with(options)
        .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!(url, "Prediction history database ready");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                condition TEXT NOT NULL,
                prediction INTEGER,
                probability REAL,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_predictions_user ON predictions (user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record(&self, record: &PredictionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO predictions (id, user_id, condition, prediction, probability, created_at, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.condition)
        .bind(record.prediction.map(i64::from))
        .bind(record.probability)
        .bind(record.created_at)
        .bind(serde_json::to_string(&record.payload)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent predictions for a user, newest first
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, condition, prediction, probability, created_at, payload
            FROM predictions
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PredictionRecord> {
                let id: String = row.try_get("id")?;
                let prediction: Option<i64> = row.try_get("prediction")?;
                let payload: String = row.try_get("payload")?;
                Ok(PredictionRecord {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| RiskError::Internal(format!("bad record id {}: {}", id, e)))?,
                    user_id: row.try_get("user_id")?,
                    condition: row.try_get("condition")?,
                    prediction: prediction.map(|p| p as u8),
                    probability: row.try_get("probability")?,
                    created_at: row.try_get("created_at")?,
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConditionReport, EnsembleResult};

    fn report(probability: f64) -> PredictionReport {
        PredictionReport::Single(ConditionReport {
            models: vec![],
            ensemble: Some(EnsembleResult {
                prediction: u8::from(probability > 0.5),
                probability,
                model_accuracy: 0.85,
            }),
        })
    }

    #[tokio::test]
    async fn test_record_and_history() {
        let db = Database::connect("sqlite::memory:").await.unwrap();

        for p in [0.2, 0.9] {
            let record =
                PredictionRecord::new("alice", Some(Condition::HeartDisease), &report(p)).unwrap();
            db.record(&record).await.unwrap();
        }
        let other = PredictionRecord::new("bob", None, &report(0.4)).unwrap();
        db.record(&other).await.unwrap();

        let history = db.history("alice", 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].probability, Some(0.9));
        assert_eq!(history[0].prediction, Some(1));
        assert_eq!(history[0].condition, "heart_disease");
        assert_eq!(history[1].probability, Some(0.2));
        assert_eq!(history[0].payload["ensemble"]["model_accuracy"], 0.85);

        let bob = db.history("bob", 50).await.unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].condition, "differential");
        assert_eq!(bob[0].id, other.id);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        for _ in 0..5 {
            let record =
                PredictionRecord::new("carol", Some(Condition::GastricCancer), &report(0.5)).unwrap();
            db.record(&record).await.unwrap();
        }
        assert_eq!(db.history("carol", 3).await.unwrap().len(), 3);
        assert!(db.history("nobody", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("history.db").display());
        let db = Database::connect(&url).await.unwrap();
        let record = PredictionRecord::new("dave", None, &report(0.1)).unwrap();
        db.record(&record).await.unwrap();
        assert!(dir.path().join("history.db").exists());
    }
}
