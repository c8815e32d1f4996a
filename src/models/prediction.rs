//! Prediction log models
//!
//! Append-only records of every prediction attempt, plus the aggregate view
//! the dashboard reads. Records are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, Row, SqlitePool};

use crate::logic::dataset::SENSOR_COUNT;
use crate::logic::guardrail::PredictionOutcome;

/// One logged single-sample prediction
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub input_data: String,
    pub predicted_region: Option<String>,
    pub confidence: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One logged batch-prediction row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BatchPredictionRecord {
    pub id: i64,
    pub filename: Option<String>,
    pub row_data: String,
    pub predicted_region: Option<String>,
    pub confidence: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Dashboard-facing view with the input deserialized back into JSON
#[derive(Debug, Serialize)]
pub struct PredictionView {
    pub id: i64,
    pub input_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub predicted_region: Option<String>,
    pub confidence: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Per-region aggregate over both log tables
#[derive(Debug, Clone, Serialize)]
pub struct RegionStat {
    pub region: String,
    pub total: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub avg_confidence: f64,
}

fn sensors_json(sensors: &[f64; SENSOR_COUNT]) -> String {
    serde_json::json!(sensors).to_string()
}

impl PredictionRecord {
    pub async fn insert(
        pool: &SqlitePool,
        sensors: &[f64; SENSOR_COUNT],
        outcome: &PredictionOutcome,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_predictions (input_data, predicted_region, confidence, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sensors_json(sensors))
        .bind(outcome.region())
        .bind(outcome.confidence())
        .bind(outcome.status())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT id, input_data, predicted_region, confidence, status, created_at
            FROM user_predictions
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub fn into_view(self) -> PredictionView {
        PredictionView {
            id: self.id,
            input_data: serde_json::from_str(&self.input_data).unwrap_or(Value::Null),
            filename: None,
            predicted_region: self.predicted_region,
            confidence: self.confidence,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

impl BatchPredictionRecord {
    pub async fn insert(
        pool: &SqlitePool,
        filename: Option<&str>,
        sensors: &[f64; SENSOR_COUNT],
        outcome: &PredictionOutcome,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO batch_predictions (filename, row_data, predicted_region, confidence, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(filename)
        .bind(sensors_json(sensors))
        .bind(outcome.region())
        .bind(outcome.confidence())
        .bind(outcome.status())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BatchPredictionRecord>(
            r#"
            SELECT id, filename, row_data, predicted_region, confidence, status, created_at
            FROM batch_predictions
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub fn into_view(self) -> PredictionView {
        PredictionView {
            id: self.id,
            input_data: serde_json::from_str(&self.row_data).unwrap_or(Value::Null),
            filename: self.filename,
            predicted_region: self.predicted_region,
            confidence: self.confidence,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

impl RegionStat {
    /// Group both log tables by predicted region: totals, acceptance split
    /// and mean confidence (3 decimals).
    pub async fn aggregate(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                predicted_region,
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'ACCEPTED' THEN 1 ELSE 0 END) AS accepted,
                AVG(confidence) AS avg_confidence
            FROM (
                SELECT predicted_region, status, confidence FROM user_predictions
                WHERE predicted_region IS NOT NULL
                UNION ALL
                SELECT predicted_region, status, confidence FROM batch_predictions
                WHERE predicted_region IS NOT NULL
            )
            GROUP BY predicted_region
            ORDER BY total DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let total: i64 = row.get("total");
                let accepted: i64 = row.get("accepted");
                let avg: Option<f64> = row.get("avg_confidence");

                RegionStat {
                    region: row.get("predicted_region"),
                    total,
                    accepted,
                    rejected: total - accepted,
                    avg_confidence: (avg.unwrap_or(0.0) * 1000.0).round() / 1000.0,
                }
            })
            .collect())
    }
}
