//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    regions: Vec<String>,
    tolerance: f64,
    confidence_threshold: f64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.service.model_loaded(),
        regions: state.service.regions().to_vec(),
        tolerance: state.service.tolerance(),
        confidence_threshold: state.service.confidence_threshold(),
    })
}
