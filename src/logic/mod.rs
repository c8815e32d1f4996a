//! Domain logic - dataset statistics, classifier oracle, guardrail gates
//!
//! - `dataset` - training CSV loading and the region label encoding
//! - `envelope` - per-channel range statistics (global + per region)
//! - `oracle` - the opaque classifier behind a trait, ONNX-backed
//! - `guardrail` - the three-gate trust pipeline
//! - `service` - request orchestration on top of the pipeline

pub mod dataset;
pub mod envelope;
pub mod guardrail;
pub mod oracle;
pub mod service;
