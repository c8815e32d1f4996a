//! Guardrail Pipeline
//!
//! Three ordered gates between a raw sensor vector and the classifier
//! output, short-circuiting at the first failure:
//!
//! 1. global range gate - any channel outside the global envelope (plus
//!    tolerance) rejects before the oracle is ever invoked
//! 2. confidence gate - probability mass at the *predicted index* must meet
//!    the threshold
//! 3. region-envelope gate - the vector must also fit the predicted
//!    region's own envelope (plus the same tolerance)
//!
//! Rejections are outcomes, not errors; only oracle failures escape as
//! `Err`.

use serde::Serialize;

use super::dataset::SENSOR_COUNT;
use super::envelope::RangeStats;
use super::oracle::{ClassifierOracle, OracleError};

/// Why the pipeline declined to trust a well-formed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    OodGlobal,
    LowConfidence,
    RegionMismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::OodGlobal => "OOD_GLOBAL",
            RejectReason::LowConfidence => "LOW_CONFIDENCE",
            RejectReason::RegionMismatch => "REGION_MISMATCH",
        }
    }

    /// Human-readable companion message for rejection payloads
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::OodGlobal => "Input values are far outside trained sensor ranges",
            RejectReason::LowConfidence => "Low model confidence - unclear region",
            RejectReason::RegionMismatch => "Sensor pattern does not fit predicted region",
        }
    }
}

/// Terminal state of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Accepted {
        region: String,
        confidence: f64,
        /// Full distribution, ordered by the region label encoding
        probabilities: Vec<f64>,
    },
    Rejected {
        reason: RejectReason,
        /// Predicted region, only for REGION_MISMATCH
        region: Option<String>,
        /// Confidence at the predicted index, absent for OOD_GLOBAL
        confidence: Option<f64>,
    },
}

impl PredictionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PredictionOutcome::Accepted { .. })
    }

    /// Status string written to the persistence log: `ACCEPTED` or the
    /// rejection reason.
    pub fn status(&self) -> &'static str {
        match self {
            PredictionOutcome::Accepted { .. } => "ACCEPTED",
            PredictionOutcome::Rejected { reason, .. } => reason.as_str(),
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            PredictionOutcome::Accepted { region, .. } => Some(region),
            PredictionOutcome::Rejected { region, .. } => region.as_deref(),
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            PredictionOutcome::Accepted { confidence, .. } => Some(*confidence),
            PredictionOutcome::Rejected { confidence, .. } => *confidence,
        }
    }
}

/// The gate configuration plus the immutable range statistics
#[derive(Debug, Clone)]
pub struct GuardrailPipeline {
    regions: Vec<String>,
    stats: RangeStats,
    tolerance: f64,
    confidence_threshold: f64,
}

impl GuardrailPipeline {
    pub fn new(
        regions: Vec<String>,
        stats: RangeStats,
        tolerance: f64,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            regions,
            stats,
            tolerance,
            confidence_threshold,
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Run one vector through the gates. Length and numeric validity are the
    /// caller's contract; this only decides trust.
    pub fn evaluate(
        &self,
        oracle: &dyn ClassifierOracle,
        sensors: &[f64; SENSOR_COUNT],
    ) -> Result<PredictionOutcome, OracleError> {
        // Gate 1: global range, before any inference cost
        if !self.stats.global().contains(sensors, self.tolerance) {
            return Ok(PredictionOutcome::Rejected {
                reason: RejectReason::OodGlobal,
                region: None,
                confidence: None,
            });
        }

        let raw = oracle.infer(sensors)?;

        // Confidence is the mass at the predicted index, not max(): the two
        // differ whenever the oracle's predict disagrees with argmax.
        let confidence = raw
            .probabilities
            .get(raw.label_index)
            .copied()
            .ok_or(OracleError::LabelOutOfRange {
                index: raw.label_index as i64,
                regions: raw.probabilities.len(),
            })?;

        let region = self
            .regions
            .get(raw.label_index)
            .ok_or(OracleError::LabelOutOfRange {
                index: raw.label_index as i64,
                regions: self.regions.len(),
            })?;

        // Gate 2: confidence threshold
        if confidence < self.confidence_threshold {
            tracing::debug!(
                region = %region,
                confidence,
                "prediction below confidence threshold"
            );
            return Ok(PredictionOutcome::Rejected {
                reason: RejectReason::LowConfidence,
                region: None,
                confidence: Some(confidence),
            });
        }

        // Gate 3: the predicted region's own envelope
        let envelope = self
            .stats
            .region(raw.label_index)
            .ok_or(OracleError::LabelOutOfRange {
                index: raw.label_index as i64,
                regions: self.regions.len(),
            })?;

        if !envelope.contains(sensors, self.tolerance) {
            return Ok(PredictionOutcome::Rejected {
                reason: RejectReason::RegionMismatch,
                region: Some(region.clone()),
                confidence: Some(confidence),
            });
        }

        Ok(PredictionOutcome::Accepted {
            region: region.clone(),
            confidence,
            probabilities: raw.probabilities,
        })
    }
}
