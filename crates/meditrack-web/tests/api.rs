//! HTTP-level behaviour of the ML API, driven through the router in-process.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use meditrack_anomaly::AnomalyConfig;
use meditrack_config::Config;
use meditrack_test_utils::{labelled_consultations, provider_roster};
use meditrack_web::router::build_router;
use meditrack_web::state::AppState;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = Config {
        anomaly: AnomalyConfig {
            mlp_hidden_layers: vec![16],
            mlp_max_iter: 100,
            ..AnomalyConfig::default()
        },
        ..Config::default()
    };
    build_router(AppState::new(&config), true)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn trained_app() -> Router {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/ml/train",
        Some(json!({ "trainingData": labelled_consultations(10, 10, 5) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    app
}

async fn providers_app() -> Router {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/ml/doctor-performance/train",
        Some(json!({ "doctors": provider_roster() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    app
}

#[tokio::test]
async fn health_reports_untrained_service() {
    let (status, body) = call(&app(), Method::GET, "/api/ml/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ML Models API");
    assert_eq!(body["trained"], false);
}

#[tokio::test]
async fn health_answers_while_training_runs() {
    let app = build_router(AppState::new(&Config::default()), true);
    let trainer = {
        let app = app.clone();
        tokio::spawn(async move {
            let batch = labelled_consultations(300, 300, 3);
            call(&app, Method::POST, "/api/ml/train", Some(json!({ "trainingData": batch }))).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = tokio::time::timeout(
        Duration::from_millis(250),
        call(&app, Method::GET, "/api/ml/health", None),
    )
    .await
    .expect("health must not wait for training");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = trainer.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, Method::GET, "/api/ml/health", None).await;
    assert_eq!(body["trained"], true);
}

#[tokio::test]
async fn predict_before_training_is_conflict() {
    let (status, body) = call(
        &app(),
        Method::POST,
        "/api/ml/predict-multi",
        Some(json!({ "features": [14.0, 7.0, 90.0] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NOT_TRAINED");
    assert_eq!(body["error"]["message"], "Models not trained yet");
}

#[tokio::test]
async fn train_without_data_is_rejected() {
    let app = app();
    for body in [json!({}), json!({ "trainingData": [] })] {
        let (status, response) = call(&app, Method::POST, "/api/ml/train", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["message"], "No training data provided");
    }
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ml/train")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_class_batch_reports_insufficient_data() {
    let batch = labelled_consultations(6, 0, 1);
    let (status, body) = call(
        &app(),
        Method::POST,
        "/api/ml/train",
        Some(json!({ "trainingData": batch })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_DATA");
}

#[tokio::test]
async fn train_returns_metrics_for_every_model() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ml/train",
        Some(json!({ "trainingData": labelled_consultations(10, 10, 5) })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["trained"], true);
    let results = body["data"]["results"].as_object().unwrap();
    let mut names: Vec<&str> = results.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec!["decision_tree", "knn", "naive_bayes", "neural_network", "svm"]
    );
    assert!(results["knn"]["accuracy"].is_number());

    let (_, health) = call(&app, Method::GET, "/api/ml/health", None).await;
    assert_eq!(health["trained"], true);
}

#[tokio::test]
async fn legacy_lab_results_key_is_accepted() {
    let (status, body) = call(
        &app(),
        Method::POST,
        "/api/ml/train",
        Some(json!({ "lab_results": labelled_consultations(6, 6, 9) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["samples"], 12);
}

#[tokio::test]
async fn predict_multi_returns_every_model_or_the_named_one() {
    let app = trained_app().await;
    let features = json!([8.0, 7.0, 85.0]);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ml/predict-multi",
        Some(json!({ "features": features })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let predictions = body["data"]["predictions"].as_object().unwrap();
    assert_eq!(predictions.len(), 5);
    for verdict in predictions.values() {
        let confidence = verdict["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/ml/predict-multi",
        Some(json!({ "features": features, "model": "decision_tree" })),
    )
    .await;
    assert_eq!(body["data"]["model"], "decision_tree");
    assert_eq!(body["data"]["prediction"]["is_abnormal"], true);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/ml/predict-multi",
        Some(json!({ "features": features, "model": "random_forest" })),
    )
    .await;
    assert_eq!(body["data"]["predictions"].as_object().unwrap().len(), 5);
}

#[tokio::test]
async fn predict_multi_validates_features() {
    let app = trained_app().await;
    for (features, code) in [
        (json!(null), "BAD_REQUEST"),
        (json!([]), "BAD_REQUEST"),
        (json!("14,7,90"), "BAD_REQUEST"),
        (json!([14.0, "high", 90.0]), "BAD_REQUEST"),
        (json!([14.0, 7.0]), "BAD_REQUEST"),
    ] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/ml/predict-multi",
            Some(json!({ "features": features })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{features}");
        assert_eq!(body["error"]["code"], code);
    }
}

#[tokio::test]
async fn single_value_predict_needs_a_value_and_three_features() {
    let app = trained_app().await;

    let (status, body) = call(&app, Method::POST, "/api/ml/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Value required");

    // The ensemble is fitted on three analytes; a lone value cannot be scored.
    let (status, _) = call(&app, Method::POST, "/api/ml/predict", Some(json!({ "value": "12.5" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_status_and_reset() {
    let app = trained_app().await;

    let (status, body) = call(&app, Method::GET, "/api/ml/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let level = body["data"]["reliability_level"].as_str().unwrap();
    assert!(["HIGH", "MEDIUM", "LOW"].contains(&level));
    assert!(body["data"]["best_model"].is_string());

    let (_, body) = call(&app, Method::GET, "/api/ml/status", None).await;
    assert_eq!(body["data"]["trained"], true);
    assert_eq!(body["data"]["data_points"], 3);

    let (status, body) = call(&app, Method::POST, "/api/ml/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trained"], false);

    let (status, _) = call(&app, Method::GET, "/api/ml/metrics", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn provider_routes_require_training() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/ml/doctor-performance/ranking", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Model not trained yet");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ml/doctor-performance/train",
        Some(json!({ "doctors": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No doctor data provided");
}

#[tokio::test]
async fn provider_train_reports_profiles() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ml/doctor-performance/train",
        Some(json!({ "doctors": provider_roster() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trained"], true);
    assert_eq!(body["data"]["doctors_analyzed"], 6);
    assert_eq!(body["data"]["doctor_info"]["d4"]["department"], "Dermatology");
}

#[tokio::test]
async fn ranking_is_descending() {
    let app = providers_app().await;
    let (status, body) = call(&app, Method::GET, "/api/ml/doctor-performance/ranking", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDoctors"], 6);

    let scores: Vec<f64> = body["data"]["rankings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["overallScore"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
}

#[tokio::test]
async fn similar_finds_peers_in_the_same_group() {
    let app = providers_app().await;
    let (status, body) = call(
        &app,
        Method::GET,
        "/api/ml/doctor-performance/similar/d1?k=2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctorId"], "d1");

    let mut peers: Vec<&str> = body["data"]["similarDoctors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["doctorId"].as_str().unwrap())
        .collect();
    peers.sort_unstable();
    assert_eq!(peers, vec!["d2", "d3"]);
}

#[tokio::test]
async fn similar_defaults_k_and_rejects_bad_queries() {
    let app = providers_app().await;

    let (_, body) = call(&app, Method::GET, "/api/ml/doctor-performance/similar/d4", None).await;
    assert_eq!(body["data"]["similarDoctors"].as_array().unwrap().len(), 3);

    let (status, body) = call(&app, Method::GET, "/api/ml/doctor-performance/similar/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Doctor nobody not found in trained data");

    let (status, _) = call(&app, Method::GET, "/api/ml/doctor-performance/similar/d1?k=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, "/api/ml/doctor-performance/similar/d1?k=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_status_and_reset() {
    let app = providers_app().await;

    let (_, body) = call(&app, Method::GET, "/api/ml/doctor-performance/status", None).await;
    assert_eq!(body["data"]["trained"], true);
    assert_eq!(body["data"]["doctors_count"], 6);
    assert_eq!(body["data"]["model_type"], "KNN (K-Nearest Neighbors)");

    let (_, body) = call(&app, Method::POST, "/api/ml/doctor-performance/reset", None).await;
    assert_eq!(body["data"]["trained"], false);
    assert_eq!(body["data"]["doctors_count"], 0);
}
