//! Per-detection outlier rejection.
//!
//! Two gates: a hard GPS-accuracy cutoff, and a local z-score test against
//! the magnitudes already committed to the candidate's cluster. The test
//! is local on purpose — a 3 g hit is unremarkable on a rough road but an
//! outlier among 1 g speed-bump reports.

use crate::stats::{mean, population_std_dev};

/// Z-score threshold beyond which a magnitude is rejected.
const MAGNITUDE_Z_SCORE_LIMIT: f64 = 2.5;

/// Minimum number of committed magnitudes before the statistical test
/// applies.
const MIN_SAMPLES_FOR_Z_TEST: usize = 3;

/// Whether a detection should be excluded from hazard statistics.
///
/// Rejects when `accuracy` exceeds `max_gps_accuracy_meters`, or when the
/// cluster already holds at least three magnitudes and the candidate
/// deviates from their mean by more than 2.5 population standard
/// deviations (with non-zero deviation). `cluster_magnitudes` must contain
/// only the magnitudes of detections already admitted to the same cluster.
#[must_use]
pub fn is_outlier(
    magnitude: f64,
    accuracy: f64,
    cluster_magnitudes: &[f64],
    max_gps_accuracy_meters: f64,
) -> bool {
    if accuracy > max_gps_accuracy_meters {
        return true;
    }

    if cluster_magnitudes.len() >= MIN_SAMPLES_FOR_Z_TEST {
        let std = population_std_dev(cluster_magnitudes);
        if std > 0.0 {
            let z = ((magnitude - mean(cluster_magnitudes)) / std).abs();
            if z > MAGNITUDE_Z_SCORE_LIMIT {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poor_gps_accuracy_is_rejected_regardless_of_magnitude() {
        assert!(is_outlier(1.0, 15.0, &[], 10.0));
        assert!(is_outlier(1.0, 10.1, &[1.0, 1.0, 1.0], 10.0));
    }

    #[test]
    fn accuracy_at_threshold_passes() {
        assert!(!is_outlier(1.0, 10.0, &[], 10.0));
    }

    #[test]
    fn no_statistical_test_below_three_samples() {
        // Wildly deviant magnitude, but too few committed samples to judge.
        assert!(!is_outlier(50.0, 5.0, &[1.0, 1.1], 10.0));
    }

    #[test]
    fn deviant_magnitude_is_rejected_against_committed_cluster() {
        // Reference scenario: 5.0 g against [1.0, 1.2, 0.9, 1.1].
        assert!(is_outlier(5.0, 5.0, &[1.0, 1.2, 0.9, 1.1], 10.0));
        // A consistent magnitude passes.
        assert!(!is_outlier(1.05, 5.0, &[1.0, 1.2, 0.9, 1.1], 10.0));
    }

    #[test]
    fn zero_deviation_cluster_never_rejects_on_magnitude() {
        assert!(!is_outlier(9.0, 5.0, &[2.0, 2.0, 2.0], 10.0));
    }
}
