//! Dashboard handlers
//!
//! Read-only views over the prediction log for the dashboard pages.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::models::{BatchPredictionRecord, PredictionRecord, PredictionView, RegionStat};
use crate::{AppResult, AppState};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize, Default)]
pub struct HistoryFilter {
    pub limit: Option<i64>,
}

/// Recent single predictions, newest first
pub async fn recent_predictions(
    State(state): State<AppState>,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<Vec<PredictionView>>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = PredictionRecord::list_recent(&state.pool, limit).await?;
    Ok(Json(records.into_iter().map(PredictionRecord::into_view).collect()))
}

/// Recent batch prediction rows, newest first
pub async fn recent_batches(
    State(state): State<AppState>,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<Vec<PredictionView>>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = BatchPredictionRecord::list_recent(&state.pool, limit).await?;
    Ok(Json(
        records
            .into_iter()
            .map(BatchPredictionRecord::into_view)
            .collect(),
    ))
}

/// Per-region totals, acceptance split and mean confidence
pub async fn region_stats(State(state): State<AppState>) -> AppResult<Json<Vec<RegionStat>>> {
    let stats = RegionStat::aggregate(&state.pool).await?;
    Ok(Json(stats))
}
