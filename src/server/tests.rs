//! Router tests

use super::auth::issue_token;
use super::*;
use crate::config::ModelsConfig;
use crate::ml::tests::{sick_heart_input, write_bundles};
use axum::body::Body;
use axum::http::{header, Request};
use serde_json::json;
use std::path::Path;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn app(models: ModelsConfig, database: Option<Database>, secret: Option<&str>) -> Router {
    let predictor = Arc::new(DualConditionPredictor::new(models));
    let state = Arc::new(AppState::new(predictor, database, secret.map(String::from)));
    create_router(state)
}

fn trained_app(dir: &Path) -> Router {
    app(write_bundles(dir), None, None)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_token(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app(ModelsConfig::default(), None, Some(SECRET));

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_predict_single_condition() {
    let dir = tempfile::tempdir().unwrap();
    let app = trained_app(dir.path());

    let mut body = sick_heart_input();
    body["condition_type"] = json!("heart_disease");
    let (status, json) = send(&app, post_json("/api/predict", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["user"], "anonymous");
    assert_eq!(json["prediction"]["ensemble"]["prediction"], 1);
    let models = json["prediction"]["modelPredictions"].as_object().unwrap();
    assert_eq!(models.len(), 6);
    assert!(models.contains_key("Logistic Regression"));
    assert!(!models.contains_key("ensemble"));
}

#[tokio::test]
async fn test_predict_differential_without_condition() {
    let dir = tempfile::tempdir().unwrap();
    let app = trained_app(dir.path());

    let (status, json) = send(&app, post_json("/api/predict", &sick_heart_input())).await;

    assert_eq!(status, StatusCode::OK);
    let prediction = &json["prediction"];
    assert!(prediction.get("ensemble").is_none());
    let reports = &prediction["modelPredictions"];
    assert!(reports["heart_disease"]["ensemble"]["probability"].is_number());
    let gastric_models: Vec<&String> = reports["gastric_cancer"]
        .as_object()
        .unwrap()
        .keys()
        .filter(|k| *k != "ensemble")
        .collect();
    assert_eq!(gastric_models.len(), 3);
    assert!(reports["differential_diagnosis"]["most_likely_condition"].is_string());
}

#[tokio::test]
async fn test_predict_client_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = trained_app(dir.path());

    let unknown = json!({"condition_type": "diabetes", "age": 50});
    let (status, json) = send(&app, post_json("/api/predict", &unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("diabetes"));

    let missing = json!({"condition_type": "heart_disease", "Age": 50});
    let (status, json) = send(&app, post_json("/api/predict", &missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Missing required fields"));

    let (status, _) = send(&app, post_json("/api/predict", &json!([1, 2, 3]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_missing_bundle_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelsConfig {
        dir: dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };
    let app = app(models, None, None);

    let mut body = sick_heart_input();
    body["condition_type"] = json!("heart_disease");
    let (status, json) = send(&app, post_json("/api/predict", &body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Error processing prediction");
    assert!(json["error"].as_str().unwrap().contains("Failed to load models"));

    let (status, json) = send(&app, get_request("/api/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["models"]["heart_disease"]["error"].is_string());
    assert!(json["models"]["gastric_cancer"]["error"].is_string());
}

#[tokio::test]
async fn test_models_summary() {
    let dir = tempfile::tempdir().unwrap();
    let app = trained_app(dir.path());

    let (status, json) = send(&app, get_request("/api/models")).await;
    assert_eq!(status, StatusCode::OK);
    let heart = &json["models"]["heart_disease"];
    assert_eq!(heart["fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(heart["models"].as_array().unwrap().len(), 6);
    assert!(heart["models"][0]["test_score"].is_number());
    assert_eq!(json["models"]["gastric_cancer"]["models"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_auth_required_when_secret_set() {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::connect("sqlite::memory:").await.unwrap();
    let app = app(write_bundles(dir.path()), Some(database), Some(SECRET));

    let mut body = sick_heart_input();
    body["condition_type"] = json!("heart_disease");

    let (status, json) = send(&app, post_json("/api/predict", &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let forged = issue_token("other-secret", "mallory", chrono::Duration::hours(1)).unwrap();
    let (status, _) = send(&app, with_token(post_json("/api/predict", &body), &forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = issue_token(SECRET, "alice", chrono::Duration::hours(1)).unwrap();
    let (status, json) = send(&app, with_token(post_json("/api/predict", &body), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"], "alice");

    let (status, json) = send(
        &app,
        with_token(get_request("/api/prediction-history"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = json["predictionHistory"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["condition"], "heart_disease");
    assert_eq!(history[0]["user_id"], "alice");

    let response = app.clone().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_history_without_storage_is_empty() {
    let app = app(ModelsConfig::default(), None, None);
    let (status, json) = send(&app, get_request("/api/prediction-history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["predictionHistory"], json!([]));
}

#[tokio::test]
async fn test_stats_count_served_and_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = trained_app(dir.path());

    let mut body = sick_heart_input();
    body["condition_type"] = json!("heart_disease");
    send(&app, post_json("/api/predict", &body)).await;
    body["Sex"] = json!("X");
    send(&app, post_json("/api/predict", &body)).await;

    let (status, json) = send(&app, get_request("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_predictions"], 1);
    assert_eq!(json["total_errors"], 1);
    assert_eq!(json["by_condition"]["heart_disease"], 1);
}
