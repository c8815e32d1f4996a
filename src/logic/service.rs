//! Prediction Service
//!
//! Orchestrates single and batch requests: shape validation in front of the
//! guardrail pipeline, the persistence side effect behind it. Validation
//! failures never reach the gates and never produce a log record; guardrail
//! rejections always produce one. A failed log write is warned about and
//! swallowed - the classification result is authoritative either way.

use std::sync::Arc;

use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::logic::dataset::SENSOR_COUNT;
use crate::logic::guardrail::{GuardrailPipeline, PredictionOutcome};
use crate::logic::oracle::ClassifierOracle;
use crate::models::{BatchPredictionRecord, PredictionRecord};

/// One evaluated sample: the parsed input echoed back plus its outcome
#[derive(Debug, Clone)]
pub struct EvaluatedSample {
    pub sensors: [f64; SENSOR_COUNT],
    pub outcome: PredictionOutcome,
}

/// A full batch run with per-row outcomes in original row order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub rows: Vec<BatchRow>,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
pub struct BatchRow {
    /// 1-based position in the uploaded file
    pub sample_index: usize,
    pub sensors: [f64; SENSOR_COUNT],
    pub outcome: PredictionOutcome,
}

pub struct PredictionService {
    pipeline: GuardrailPipeline,
    oracle: Option<Arc<dyn ClassifierOracle>>,
    pool: SqlitePool,
    max_batch_rows: usize,
}

impl PredictionService {
    pub fn new(
        pipeline: GuardrailPipeline,
        oracle: Option<Arc<dyn ClassifierOracle>>,
        pool: SqlitePool,
        max_batch_rows: usize,
    ) -> Self {
        Self {
            pipeline,
            oracle,
            pool,
            max_batch_rows,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn regions(&self) -> &[String] {
        self.pipeline.regions()
    }

    pub fn tolerance(&self) -> f64 {
        self.pipeline.tolerance()
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.pipeline.confidence_threshold()
    }

    /// Single-sample path: validate, gate, log, return.
    pub async fn predict_single(&self, payload: &Value) -> Result<EvaluatedSample, AppError> {
        let oracle = self.oracle.as_ref().ok_or(AppError::ModelUnavailable)?;
        let sensors = parse_sensors(payload)?;

        let outcome = self.pipeline.evaluate(oracle.as_ref(), &sensors)?;

        if let Err(e) = PredictionRecord::insert(&self.pool, &sensors, &outcome).await {
            tracing::warn!("failed to persist prediction: {}", e);
        }

        Ok(EvaluatedSample { sensors, outcome })
    }

    /// Batch path: structural validation of the whole file first, then each
    /// row through the pipeline independently, in file order.
    pub async fn predict_batch(
        &self,
        filename: Option<&str>,
        body: &[u8],
    ) -> Result<BatchReport, AppError> {
        let oracle = self.oracle.as_ref().ok_or(AppError::ModelUnavailable)?;
        let samples = parse_batch_csv(body, self.max_batch_rows)?;

        let mut rows = Vec::with_capacity(samples.len());
        let mut accepted = 0;
        let mut rejected = 0;

        for (idx, sensors) in samples.into_iter().enumerate() {
            let outcome = self.pipeline.evaluate(oracle.as_ref(), &sensors)?;

            if outcome.is_accepted() {
                accepted += 1;
            } else {
                rejected += 1;
            }

            if let Err(e) =
                BatchPredictionRecord::insert(&self.pool, filename, &sensors, &outcome).await
            {
                tracing::warn!("failed to persist batch row {}: {}", idx + 1, e);
            }

            rows.push(BatchRow {
                sample_index: idx + 1,
                sensors,
                outcome,
            });
        }

        Ok(BatchReport {
            rows,
            accepted,
            rejected,
        })
    }
}

/// Pull exactly 7 numbers out of the request body's `sensors` field
fn parse_sensors(payload: &Value) -> Result<[f64; SENSOR_COUNT], AppError> {
    let field = payload
        .get("sensors")
        .ok_or_else(|| AppError::Validation("Missing \"sensors\" field".to_string()))?;

    let array = field
        .as_array()
        .ok_or_else(|| AppError::Validation("Sensors must be an array".to_string()))?;

    if array.len() != SENSOR_COUNT {
        return Err(AppError::Validation(format!(
            "Exactly {} sensor values required",
            SENSOR_COUNT
        )));
    }

    let mut sensors = [0.0f64; SENSOR_COUNT];
    for (i, value) in array.iter().enumerate() {
        sensors[i] = value
            .as_f64()
            .ok_or_else(|| AppError::Validation("All sensor values must be numbers".to_string()))?;
    }

    Ok(sensors)
}

/// Parse an uploaded CSV into sensor vectors, enforcing the structural
/// constraints: header row, exactly 7 columns, at least one data row, at
/// most `max_rows` rows, every cell a finite number.
fn parse_batch_csv(body: &[u8], max_rows: usize) -> Result<Vec<[f64; SENSOR_COUNT]>, AppError> {
    let mut reader = csv::Reader::from_reader(body);

    if let Ok(headers) = reader.headers() {
        if headers.len() != SENSOR_COUNT {
            return Err(AppError::Validation(format!(
                "CSV must contain exactly {} sensor columns",
                SENSOR_COUNT
            )));
        }
    }

    let mut samples = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|_| AppError::Validation("Invalid CSV format".to_string()))?;

        if record.len() != SENSOR_COUNT {
            return Err(AppError::Validation(format!(
                "CSV must contain exactly {} sensor columns",
                SENSOR_COUNT
            )));
        }

        if samples.len() >= max_rows {
            return Err(AppError::Validation(format!(
                "Maximum {} samples per upload",
                max_rows
            )));
        }

        let mut sensors = [0.0f64; SENSOR_COUNT];
        for (i, cell) in record.iter().enumerate() {
            let value: f64 = cell
                .trim()
                .parse()
                .map_err(|_| AppError::Validation("All sensor values must be numeric".to_string()))?;
            if !value.is_finite() {
                return Err(AppError::Validation(
                    "All sensor values must be numeric".to_string(),
                ));
            }
            sensors[i] = value;
        }

        samples.push(sensors);
    }

    if samples.is_empty() {
        return Err(AppError::Validation("CSV file is empty".to_string()));
    }

    Ok(samples)
}
