//! HTTP prediction API

pub mod auth;

use crate::bundle::BundleSummary;
use crate::error::RiskError;
use crate::ml::DualConditionPredictor;
use crate::monitor::{PredictionMonitor, PredictionStats};
use crate::storage::{Database, PredictionRecord};
use crate::types::{Condition, ConditionReport, DiagnosisReport, EnsembleResult, PredictionReport};
use auth::{bearer_token, verify_token, AuthUser, ANONYMOUS};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Records returned by the history route
pub const HISTORY_LIMIT: i64 = 50;

/// Recent events kept by the stats monitor
const RECENT_EVENTS: usize = 100;

/// State shared across handlers
pub struct AppState {
    pub predictor: Arc<DualConditionPredictor>,
    pub database: Option<Database>,
    /// API is open when unset
    pub jwt_secret: Option<String>,
    pub monitor: PredictionMonitor,
}

impl AppState {
    pub fn new(
        predictor: Arc<DualConditionPredictor>,
        database: Option<Database>,
        jwt_secret: Option<String>,
    ) -> Self {
        Self {
            predictor,
            database,
            jwt_secret,
            monitor: PredictionMonitor::new(RECENT_EVENTS),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>, error: Option<String>) -> Response {
    let body = ErrorBody {
        success: false,
        message: message.into(),
        error,
    };
    (status, Json(body)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message, None)
}

// ============ Authentication ============

async fn require_auth(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let user = match &state.jwt_secret {
        None => ANONYMOUS.to_string(),
        Some(secret) => {
            let Some(token) = bearer_token(request.headers()) else {
                return error_response(StatusCode::UNAUTHORIZED, "Authentication required", None);
            };
            match verify_token(secret, token) {
                Ok(claims) => claims.sub,
                Err(e) => {
                    warn!("Rejected token: {}", e);
                    return error_response(StatusCode::UNAUTHORIZED, e.to_string(), None);
                }
            }
        }
    };

    request.extensions_mut().insert(AuthUser(user));
    next.run(request).await
}

// ============ HTTP API Handlers ============

/// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Per-model outcomes for one condition, or both condition reports
#[derive(Serialize)]
#[serde(untagged)]
enum ModelPredictions {
    Single(ConditionReport),
    Differential(DiagnosisReport),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionBody {
    /// Absent for a differential diagnosis
    #[serde(skip_serializing_if = "Option::is_none")]
    ensemble: Option<EnsembleResult>,
    model_predictions: ModelPredictions,
}

impl From<PredictionReport> for PredictionBody {
    fn from(report: PredictionReport) -> Self {
        match report {
            PredictionReport::Single(report) => PredictionBody {
                ensemble: report.ensemble,
                model_predictions: ModelPredictions::Single(ConditionReport {
                    models: report.models,
                    ensemble: None,
                }),
            },
            PredictionReport::Differential(diagnosis) => PredictionBody {
                ensemble: None,
                model_predictions: ModelPredictions::Differential(diagnosis),
            },
        }
    }
}

#[derive(Serialize)]
struct PredictResponse {
    success: bool,
    prediction: PredictionBody,
    user: String,
}

/// Pop `condition_type`; absent or null means differential diagnosis
fn take_condition(input: &mut Value) -> Result<Option<Condition>, RiskError> {
    let Some(fields) = input.as_object_mut() else {
        return Err(RiskError::InvalidInput("request body must be a JSON object".into()));
    };
    match fields.remove("condition_type") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(RiskError::UnknownCondition(other.to_string())),
    }
}

/// Predict one condition, or both when no condition is given
async fn predict(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let mut input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let condition = match take_condition(&mut input) {
        Ok(condition) => condition,
        Err(e) => return bad_request(e.to_string()),
    };

    let predictor = Arc::clone(&state.predictor);
    let result = tokio::task::spawn_blocking(move || predictor.predict(&input, condition))
        .await
        .unwrap_or_else(|e| Err(RiskError::Internal(format!("prediction task failed: {}", e))));

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            state.monitor.record_error(condition, &e.to_string()).await;
            if e.is_client_error() {
                warn!(user = %user, "Rejected prediction input: {}", e);
                return bad_request(e.to_string());
            }
            error!(user = %user, "Prediction failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing prediction",
                Some(e.to_string()),
            );
        }
    };

    state.monitor.record_report(condition, &report).await;
    if let Some(database) = &state.database {
        let stored = match PredictionRecord::new(&user, condition, &report) {
            Ok(record) => database.record(&record).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            warn!(user = %user, "Failed to store prediction: {}", e);
        }
    }

    Json(PredictResponse {
        success: true,
        prediction: report.into(),
        user,
    })
    .into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    success: bool,
    prediction_history: Vec<PredictionRecord>,
}

/// Caller's most recent predictions
async fn prediction_history(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Response {
    let prediction_history = match &state.database {
        None => Vec::new(),
        Some(database) => match database.history(&user, HISTORY_LIMIT).await {
            Ok(records) => records,
            Err(e) => {
                error!(user = %user, "Failed to read prediction history: {}", e);
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error fetching prediction history",
                    Some(e.to_string()),
                );
            }
        },
    };

    Json(HistoryResponse {
        success: true,
        prediction_history,
    })
    .into_response()
}

#[derive(Serialize)]
#[serde(untagged)]
enum BundleEntry {
    Loaded(BundleSummary),
    Failed { error: String },
}

#[derive(Serialize)]
struct ModelsResponse {
    success: bool,
    models: BTreeMap<&'static str, BundleEntry>,
}

/// Bundle summary per condition
async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    let predictor = Arc::clone(&state.predictor);
    let loaded = tokio::task::spawn_blocking(move || {
        Condition::ALL
            .iter()
            .map(|&condition| {
                let entry = match predictor.bundle(condition) {
                    Ok(loaded) => BundleEntry::Loaded(loaded.summary()),
                    Err(e) => BundleEntry::Failed {
                        error: e.to_string(),
                    },
                };
                (condition.as_str(), entry)
            })
            .collect::<BTreeMap<_, _>>()
    })
    .await;

    match loaded {
        Ok(models) => Json(ModelsResponse {
            success: true,
            models,
        })
        .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error loading models",
            Some(e.to_string()),
        ),
    }
}

/// Prediction counters
async fn get_stats(State(state): State<Arc<AppState>>) -> Json<PredictionStats> {
    Json(state.monitor.get_stats().await)
}

/// Create API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/predict", post(predict))
        .route("/prediction-history", get(prediction_history))
        .route("/models", get(list_models))
        .route("/stats", get(get_stats))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
}

/// Start API server
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> crate::error::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    info!("Prediction API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests;
