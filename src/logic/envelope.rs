//! Range Statistics Store
//!
//! Per-channel min/max envelopes observed in the training data, held
//! globally and per region. Computed once at startup, immutable afterwards.
//! Every range check goes through [`Envelope::contains`] so the tolerance
//! handling lives in exactly one place.

use super::dataset::{TrainingSet, SENSOR_COUNT};

/// Observed [min, max] interval per sensor channel for one scope
#[derive(Debug, Clone)]
pub struct Envelope {
    pub min: [f64; SENSOR_COUNT],
    pub max: [f64; SENSOR_COUNT],
}

impl Envelope {
    fn from_rows<'a, I>(mut rows: I) -> Option<Self>
    where
        I: Iterator<Item = &'a [f64; SENSOR_COUNT]>,
    {
        let first = rows.next()?;
        let mut envelope = Envelope {
            min: *first,
            max: *first,
        };

        for sensors in rows {
            for i in 0..SENSOR_COUNT {
                envelope.min[i] = envelope.min[i].min(sensors[i]);
                envelope.max[i] = envelope.max[i].max(sensors[i]);
            }
        }

        Some(envelope)
    }

    /// True when every channel lies within [min - tolerance, max + tolerance],
    /// bounds inclusive.
    pub fn contains(&self, sensors: &[f64; SENSOR_COUNT], tolerance: f64) -> bool {
        sensors
            .iter()
            .enumerate()
            .all(|(i, &v)| v >= self.min[i] - tolerance && v <= self.max[i] + tolerance)
    }
}

/// Global and per-region envelopes derived from the training data
#[derive(Debug, Clone)]
pub struct RangeStats {
    global: Envelope,
    regions: Vec<Envelope>,
}

impl RangeStats {
    /// Compute envelopes over the full dataset and over each region's rows.
    ///
    /// The dataset guarantees at least one row overall and at least one row
    /// per region index, so both `from_rows` calls always produce a value;
    /// the degenerate fallback keeps the arms total without panicking.
    pub fn from_training(set: &TrainingSet) -> Self {
        let degenerate = Envelope {
            min: [0.0; SENSOR_COUNT],
            max: [0.0; SENSOR_COUNT],
        };

        let global = Envelope::from_rows(set.rows().iter().map(|r| &r.sensors))
            .unwrap_or_else(|| degenerate.clone());

        let regions = (0..set.regions().len())
            .map(|idx| {
                Envelope::from_rows(
                    set.rows()
                        .iter()
                        .filter(|r| r.region == idx)
                        .map(|r| &r.sensors),
                )
                .unwrap_or_else(|| degenerate.clone())
            })
            .collect();

        Self { global, regions }
    }

    pub fn global(&self) -> &Envelope {
        &self.global
    }

    pub fn region(&self, index: usize) -> Option<&Envelope> {
        self.regions.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> TrainingSet {
        TrainingSet::from_labeled_rows(vec![
            ([1.0, 10.0, 100.0, 1.0, 1.0, 1.0, 1.0], "Kandy".to_string()),
            ([3.0, 30.0, 300.0, 1.0, 1.0, 1.0, 1.0], "Kandy".to_string()),
            ([2.0, 20.0, 200.0, 5.0, 5.0, 5.0, 5.0], "Uva".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn test_global_envelope() {
        let stats = RangeStats::from_training(&sample_set());
        assert_eq!(stats.global().min[0], 1.0);
        assert_eq!(stats.global().max[0], 3.0);
        assert_eq!(stats.global().min[2], 100.0);
        assert_eq!(stats.global().max[2], 300.0);
    }

    #[test]
    fn test_region_envelopes() {
        let set = sample_set();
        let stats = RangeStats::from_training(&set);

        // Kandy is index 0, Uva index 1 (sorted)
        let kandy = stats.region(0).unwrap();
        assert_eq!(kandy.min[0], 1.0);
        assert_eq!(kandy.max[0], 3.0);
        assert_eq!(kandy.max[3], 1.0);

        let uva = stats.region(1).unwrap();
        assert_eq!(uva.min[0], 2.0);
        assert_eq!(uva.max[0], 2.0);
    }

    #[test]
    fn test_region_envelopes_subset_of_global() {
        let set = sample_set();
        let stats = RangeStats::from_training(&set);

        for idx in 0..set.regions().len() {
            let region = stats.region(idx).unwrap();
            for i in 0..SENSOR_COUNT {
                assert!(region.min[i] >= stats.global().min[i]);
                assert!(region.max[i] <= stats.global().max[i]);
            }
        }
    }

    #[test]
    fn test_contains_with_tolerance() {
        let stats = RangeStats::from_training(&sample_set());
        let global = stats.global();

        let inside = [2.0, 20.0, 200.0, 3.0, 3.0, 3.0, 3.0];
        assert!(global.contains(&inside, 5.0));

        // One channel beyond max + tolerance
        let outside = [2.0, 20.0, 306.0, 3.0, 3.0, 3.0, 3.0];
        assert!(!global.contains(&outside, 5.0));
    }

    #[test]
    fn test_boundary_exactly_on_tolerance_passes() {
        let stats = RangeStats::from_training(&sample_set());
        let global = stats.global();

        // max[2] = 300.0, tolerance 5.0: 305.0 is still in
        let at_bound = [2.0, 20.0, 305.0, 3.0, 3.0, 3.0, 3.0];
        assert!(global.contains(&at_bound, 5.0));

        let past_bound = [2.0, 20.0, 305.0 + 1e-9, 3.0, 3.0, 3.0, 3.0];
        assert!(!global.contains(&past_bound, 5.0));

        // Same on the min side: min[0] = 1.0 -> -4.0 passes, below fails
        let at_min = [-4.0, 20.0, 200.0, 3.0, 3.0, 3.0, 3.0];
        assert!(global.contains(&at_min, 5.0));

        let below_min = [-4.0 - 1e-9, 20.0, 200.0, 3.0, 3.0, 3.0, 3.0];
        assert!(!global.contains(&below_min, 5.0));
    }
}
