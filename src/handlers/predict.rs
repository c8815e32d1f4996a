//! Prediction handlers
//!
//! Guardrail rejections are well-formed responses, not errors: they
//! serialize with HTTP 422 and carry the gate's reason plus whatever
//! partial metadata that gate produced. Validation problems surface as 400
//! through `AppError` before any gate runs.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::logic::guardrail::{PredictionOutcome, RejectReason};
use crate::logic::oracle::MODEL_NAME;
use crate::logic::service::EvaluatedSample;
use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
struct PredictResponse {
    success: bool,
    prediction: String,
    confidence: f64,
    probabilities: BTreeMap<String, f64>,
    input_sensors: Vec<f64>,
    model: &'static str,
}

#[derive(Serialize)]
struct BatchResponse {
    success: bool,
    total_samples: usize,
    accepted: usize,
    rejected: usize,
    model: &'static str,
    results: Vec<BatchRowResponse>,
}

#[derive(Serialize)]
struct BatchRowResponse {
    sample_index: usize,
    input_sensors: Vec<f64>,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probabilities: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicted_region: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BatchUploadParams {
    pub filename: Option<String>,
}

/// Single-sample prediction
pub async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Response> {
    let evaluated = state.service.predict_single(&payload).await?;
    Ok(single_response(state.service.regions(), evaluated))
}

/// Batch prediction from an uploaded CSV body
pub async fn predict_batch(
    State(state): State<AppState>,
    Query(params): Query<BatchUploadParams>,
    body: Bytes,
) -> AppResult<Response> {
    if body.is_empty() {
        return Err(AppError::Validation("No file provided".to_string()));
    }

    if let Some(name) = &params.filename {
        if !name.to_lowercase().ends_with(".csv") {
            return Err(AppError::Validation("Only CSV files are accepted".to_string()));
        }
    }

    let report = state
        .service
        .predict_batch(params.filename.as_deref(), &body)
        .await?;

    let regions = state.service.regions();
    let results: Vec<BatchRowResponse> = report
        .rows
        .into_iter()
        .map(|row| batch_row_response(regions, row.sample_index, row.sensors, row.outcome))
        .collect();

    let response = BatchResponse {
        success: true,
        total_samples: results.len(),
        accepted: report.accepted,
        rejected: report.rejected,
        model: MODEL_NAME,
        results,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

fn probability_map(regions: &[String], probabilities: &[f64]) -> BTreeMap<String, f64> {
    regions
        .iter()
        .cloned()
        .zip(probabilities.iter().copied())
        .collect()
}

fn single_response(regions: &[String], evaluated: EvaluatedSample) -> Response {
    match evaluated.outcome {
        PredictionOutcome::Accepted {
            region,
            confidence,
            probabilities,
        } => {
            let response = PredictResponse {
                success: true,
                prediction: region,
                confidence,
                probabilities: probability_map(regions, &probabilities),
                input_sensors: evaluated.sensors.to_vec(),
                model: MODEL_NAME,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        PredictionOutcome::Rejected {
            reason,
            region,
            confidence,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(rejection_body(reason, region.as_deref(), confidence)),
        )
            .into_response(),
    }
}

fn rejection_body(reason: RejectReason, region: Option<&str>, confidence: Option<f64>) -> Value {
    let mut body = json!({
        "success": false,
        "reason": reason.as_str(),
        "error": reason.message(),
    });
    if let Some(confidence) = confidence {
        body["confidence"] = json!(confidence);
    }
    if let Some(region) = region {
        body["predicted_region"] = json!(region);
    }
    body
}

fn batch_row_response(
    regions: &[String],
    sample_index: usize,
    sensors: [f64; crate::logic::dataset::SENSOR_COUNT],
    outcome: PredictionOutcome,
) -> BatchRowResponse {
    let mut row = BatchRowResponse {
        sample_index,
        input_sensors: sensors.to_vec(),
        status: "REJECTED",
        prediction: None,
        confidence: None,
        probabilities: None,
        reason: None,
        predicted_region: None,
    };

    match outcome {
        PredictionOutcome::Accepted {
            region,
            confidence,
            probabilities,
        } => {
            row.status = "ACCEPTED";
            row.prediction = Some(region);
            row.confidence = Some(confidence);
            row.probabilities = Some(probability_map(regions, &probabilities));
        }
        PredictionOutcome::Rejected {
            reason,
            region,
            confidence,
        } => {
            row.reason = Some(reason.as_str());
            row.confidence = confidence;
            row.predicted_region = region;
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::logic::dataset::TrainingSet;
    use crate::logic::envelope::RangeStats;
    use crate::logic::guardrail::GuardrailPipeline;
    use crate::logic::oracle::testing::StubOracle;
    use crate::logic::oracle::ClassifierOracle;
    use crate::logic::service::PredictionService;

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            model_path: String::new(),
            training_data_path: String::new(),
            tolerance: 5.0,
            confidence_threshold: 0.55,
            max_batch_rows: 500,
        }
    }

    async fn test_state(oracle: Option<Arc<dyn ClassifierOracle>>) -> AppState {
        let set = TrainingSet::from_labeled_rows(vec![
            ([10.0; 7], "Kandy".to_string()),
            ([20.0; 7], "Kandy".to_string()),
            ([80.0; 7], "Uva".to_string()),
            ([90.0; 7], "Uva".to_string()),
        ])
        .unwrap();
        let stats = RangeStats::from_training(&set);
        let pipeline = GuardrailPipeline::new(set.regions().to_vec(), stats, 5.0, 0.55);

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let service = Arc::new(PredictionService::new(pipeline, oracle, pool.clone(), 500));

        AppState {
            service,
            pool,
            config: test_config(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn csv_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_predict_accepted_returns_200() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [15, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["prediction"], json!("Kandy"));
        assert_eq!(body["model"], json!("ExtraTrees"));
        assert_eq!(body["input_sensors"].as_array().unwrap().len(), 7);

        let probs = body["probabilities"].as_object().unwrap();
        let sum: f64 = probs.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_predict_wrong_length_returns_400() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request("/predict", json!({ "sensors": [1, 2, 3] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Exactly 7 sensor values required"));
    }

    #[tokio::test]
    async fn test_predict_ood_returns_422_with_reason() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [500, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["reason"], json!("OOD_GLOBAL"));
        assert!(body.get("predicted_region").is_none());
    }

    #[tokio::test]
    async fn test_predict_low_confidence_carries_confidence_only() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.5, 0.5])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [15, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["reason"], json!("LOW_CONFIDENCE"));
        assert_eq!(body["confidence"], json!(0.5));
        assert!(body.get("predicted_region").is_none());
    }

    #[tokio::test]
    async fn test_predict_region_mismatch_carries_prediction() {
        // Oracle claims Uva for a vector in Kandy's range
        let state = test_state(Some(Arc::new(StubOracle::new(1, vec![0.1, 0.9])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [15, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["reason"], json!("REGION_MISMATCH"));
        assert_eq!(body["predicted_region"], json!("Uva"));
        assert_eq!(body["confidence"], json!(0.9));
    }

    #[tokio::test]
    async fn test_predict_without_model_returns_500() {
        let state = test_state(None).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [15, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("Model not loaded"));
    }

    #[tokio::test]
    async fn test_batch_returns_per_row_results() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let csv = "s1,s2,s3,s4,s5,s6,s7\n\
                   15,15,15,15,15,15,15\n\
                   500,15,15,15,15,15,15\n";
        let response = app
            .oneshot(csv_request("/predict-batch?filename=upload.csv", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["total_samples"], json!(2));
        assert_eq!(body["accepted"], json!(1));
        assert_eq!(body["rejected"], json!(1));

        let results = body["results"].as_array().unwrap();
        assert_eq!(results[0]["sample_index"], json!(1));
        assert_eq!(results[0]["status"], json!("ACCEPTED"));
        assert_eq!(results[0]["prediction"], json!("Kandy"));
        assert_eq!(results[1]["sample_index"], json!(2));
        assert_eq!(results[1]["status"], json!("REJECTED"));
        assert_eq!(results[1]["reason"], json!("OOD_GLOBAL"));
    }

    #[tokio::test]
    async fn test_batch_empty_body_returns_400() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(csv_request("/predict-batch", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("No file provided"));
    }

    #[tokio::test]
    async fn test_batch_non_csv_filename_returns_400() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(csv_request(
                "/predict-batch?filename=samples.txt",
                "s1,s2,s3,s4,s5,s6,s7\n1,2,3,4,5,6,7\n",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("Only CSV files are accepted"));
    }

    #[tokio::test]
    async fn test_health_reports_guardrail_settings() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["model_loaded"], json!(true));
        assert_eq!(body["regions"], json!(["Kandy", "Uva"]));
        assert_eq!(body["tolerance"], json!(5.0));
        assert_eq!(body["confidence_threshold"], json!(0.55));
    }

    #[tokio::test]
    async fn test_dashboard_regions_after_predictions() {
        let state = test_state(Some(Arc::new(StubOracle::new(0, vec![0.9, 0.1])))).await;
        let app = crate::create_router(state.clone());

        let response = app
            .oneshot(json_request(
                "/predict",
                json!({ "sensors": [15, 15, 15, 15, 15, 15, 15] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let app = crate::create_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/dashboard/regions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let stats = body.as_array().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0]["region"], json!("Kandy"));
        assert_eq!(stats[0]["total"], json!(1));
        assert_eq!(stats[0]["accepted"], json!(1));
    }
}
