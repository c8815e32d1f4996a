//! Training dataset loader
//!
//! Reads the labeled aroma dataset once at startup and derives the region
//! label encoding from it. The encoding is the sorted distinct label set,
//! matching the encoder the classifier was fitted with; indices coming back
//! from the oracle are resolved against this list and nothing else.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

/// Number of aroma sensor channels per sample
pub const SENSOR_COUNT: usize = 7;

/// One labeled training sample
#[derive(Debug, Clone)]
pub struct TrainingRow {
    pub sensors: [f64; SENSOR_COUNT],
    /// Index into the sorted region list
    pub region: usize,
}

/// The labeled training dataset plus its derived label encoding
#[derive(Debug, Clone)]
pub struct TrainingSet {
    rows: Vec<TrainingRow>,
    regions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read training data: {0}")]
    Read(#[from] csv::Error),

    #[error("training data contains no samples")]
    Empty,

    #[error("row {row} has {found} columns, expected {expected} sensor columns plus a label")]
    ColumnCount {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("row {row}, column {column} is not a finite number")]
    NonNumeric { row: usize, column: usize },

    #[error("row {row} has a blank region label")]
    BlankLabel { row: usize },

    #[error("training data has {found} distinct region label(s), need at least 2")]
    TooFewRegions { found: usize },
}

impl TrainingSet {
    /// Load and validate the training CSV (header row, 7 sensor columns,
    /// final label column).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let mut reader = csv::Reader::from_path(path)?;

        let mut labeled = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // 1-based, counting the header as row 1
            let row = idx + 2;
            let record = result?;

            if record.len() != SENSOR_COUNT + 1 {
                return Err(DatasetError::ColumnCount {
                    row,
                    found: record.len(),
                    expected: SENSOR_COUNT,
                });
            }

            let mut sensors = [0.0f64; SENSOR_COUNT];
            for (col, cell) in record.iter().take(SENSOR_COUNT).enumerate() {
                let value: f64 = cell
                    .trim()
                    .parse()
                    .map_err(|_| DatasetError::NonNumeric { row, column: col + 1 })?;
                if !value.is_finite() {
                    return Err(DatasetError::NonNumeric { row, column: col + 1 });
                }
                sensors[col] = value;
            }

            let label = record[SENSOR_COUNT].trim();
            if label.is_empty() {
                return Err(DatasetError::BlankLabel { row });
            }

            labeled.push((sensors, label.to_string()));
        }

        Self::from_labeled_rows(labeled)
    }

    /// Build a training set from already-parsed rows. Fails on an empty set
    /// or a degenerate label space, same as [`TrainingSet::load`].
    pub fn from_labeled_rows(
        labeled: Vec<([f64; SENSOR_COUNT], String)>,
    ) -> Result<Self, DatasetError> {
        if labeled.is_empty() {
            return Err(DatasetError::Empty);
        }

        // Sorted distinct labels define the index <-> region bijection.
        let regions: Vec<String> = labeled
            .iter()
            .map(|(_, label)| label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if regions.len() < 2 {
            return Err(DatasetError::TooFewRegions {
                found: regions.len(),
            });
        }

        let rows = labeled
            .into_iter()
            .map(|(sensors, label)| {
                // binary_search over the sorted list always hits: the list
                // was built from these exact labels
                let region = regions
                    .binary_search(&label)
                    .unwrap_or_default();
                TrainingRow { sensors, region }
            })
            .collect();

        Ok(Self { rows, regions })
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    /// Region names, sorted; position is the oracle's label index
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
