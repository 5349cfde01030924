//! Hazard scoring: centroid, severity, confidence, type classification,
//! decay, and temporal weighting.
//!
//! Each computation is independent and pure. The aggregation pipeline uses
//! the creation-time functions when a cluster first becomes a hazard; the
//! decay sweep and the alert ranker use the ongoing-confidence form, which
//! is recomputed from a hazard's accumulated statistics.

use bump_aware_hazard_models::HazardType;

use crate::EmptyClusterError;
use crate::stats::{mean, population_std_dev, round_to};

/// Maximum realistic detection magnitude, in g. Severity is scaled
/// against this.
const MAX_REALISTIC_MAGNITUDE_G: f64 = 5.0;

/// Accumulated statistics for an existing hazard, the inputs to
/// [`ongoing_confidence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardObservations {
    /// Total detections linked to the hazard.
    pub detection_count: u64,
    /// Distinct users among those detections.
    pub unique_user_count: u64,
    /// Whole days since the most recent linked detection.
    pub days_since_last_detection: i64,
    /// Confirm votes.
    pub positive_verifications: u64,
    /// All votes (confirm + dispute).
    pub total_verifications: u64,
}

/// Arithmetic-mean centroid of a cluster's coordinates.
///
/// # Errors
///
/// Returns [`EmptyClusterError`] for an empty slice — membership is decided
/// before scoring, so this is never a normal outcome.
pub fn centroid(coords: &[(f64, f64)]) -> Result<(f64, f64), EmptyClusterError> {
    if coords.is_empty() {
        return Err(EmptyClusterError);
    }
    let lats: Vec<f64> = coords.iter().map(|&(lat, _)| lat).collect();
    let lons: Vec<f64> = coords.iter().map(|&(_, lon)| lon).collect();
    Ok((mean(&lats), mean(&lons)))
}

/// Severity score on the 0-10 scale for a cluster's magnitudes.
///
/// Weighted 70% mean / 30% max, scaled assuming a realistic maximum of
/// 5 g, clamped to 10, rounded to 2 decimal places. Empty input scores
/// 0.0.
#[must_use]
pub fn severity(magnitudes: &[f64]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let avg = mean(magnitudes);
    let max = magnitudes.iter().copied().fold(f64::MIN, f64::max);
    let weighted = 0.7 * avg + 0.3 * max;
    let scaled = (weighted / MAX_REALISTIC_MAGNITUDE_G * 10.0).min(10.0);
    round_to(scaled, 2)
}

/// Confidence assigned when a hazard is first formed from a cluster.
///
/// `min(1.0, detections x 0.1 + unique users x 0.2)`, rounded to 2
/// decimal places. Five detections from two users already reach 0.9.
#[must_use]
pub fn creation_confidence(detection_count: u64, unique_user_count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let raw = detection_count as f64 * 0.1 + unique_user_count as f64 * 0.2;
    round_to(raw.min(1.0), 2)
}

/// Ongoing confidence for an existing hazard, recomputed from accumulated
/// statistics.
///
/// Sum of four capped components: detection count (up to 0.4 at 10
/// detections), unique users (up to 0.3 at 5 users), recency (step
/// function of days since the last detection), and the positive
/// verification ratio (up to 0.1). Clamped to 1.0, rounded to 3 decimal
/// places.
#[must_use]
pub fn ongoing_confidence(obs: &HazardObservations) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let detection_score = (obs.detection_count as f64 / 10.0 * 0.4).min(0.4);
    #[allow(clippy::cast_precision_loss)]
    let user_score = (obs.unique_user_count as f64 / 5.0 * 0.3).min(0.3);

    let recency_score = match obs.days_since_last_detection {
        ..=7 => 0.2,
        8..=30 => 0.15,
        31..=60 => 0.1,
        _ => 0.05,
    };

    let verification_score = if obs.total_verifications > 0 {
        #[allow(clippy::cast_precision_loss)]
        let ratio = obs.positive_verifications as f64 / obs.total_verifications as f64;
        ratio * 0.1
    } else {
        0.0
    };

    let total = detection_score + user_score + recency_score + verification_score;
    round_to(total.min(1.0), 3)
}

/// Classifies a hazard from its cluster's magnitude distribution.
///
/// Checked in order — speed bump, then pothole, then rough road — so a
/// high-magnitude but consistent profile classifies as a speed bump even
/// when its peak would also satisfy the pothole rule.
#[must_use]
pub fn classify(magnitudes: &[f64]) -> HazardType {
    if magnitudes.is_empty() {
        return HazardType::Unknown;
    }

    let avg = mean(magnitudes);
    let max = magnitudes.iter().copied().fold(f64::MIN, f64::max);
    let std = population_std_dev(magnitudes);

    if avg > 2.5 && std < 0.5 {
        return HazardType::SpeedBump;
    }
    if max > 3.5 {
        return HazardType::Pothole;
    }
    if avg > 1.5 && std < 1.0 {
        return HazardType::RoughRoad;
    }
    HazardType::Unknown
}

/// Whether a hazard has gone stale enough to deactivate.
///
/// True when the last detection is older than the decay window and the
/// ongoing confidence has dropped below 0.3 — the "probably repaired"
/// signal. Deactivation only flips `is_active`; nothing is deleted.
#[must_use]
pub fn should_deactivate(
    days_since_last_detection: i64,
    confidence: f64,
    decay_window_days: i64,
) -> bool {
    days_since_last_detection > decay_window_days && confidence < 0.3
}

/// Weight damping the contribution of a detection as it ages.
///
/// 1.0 while the detection is within the fresh window, 0.1 once it
/// reaches the fully-decayed window, linear in between.
#[must_use]
pub fn temporal_weight(days_old: i64, fresh_days: i64, decayed_days: i64) -> f64 {
    if days_old <= fresh_days {
        return 1.0;
    }
    if days_old >= decayed_days {
        return 0.1;
    }
    #[allow(clippy::cast_precision_loss)]
    let progress = (days_old - fresh_days) as f64 / (decayed_days - fresh_days) as f64;
    1.0 - 0.9 * progress
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_empty_cluster_is_an_error() {
        assert_eq!(centroid(&[]), Err(EmptyClusterError));
    }

    #[test]
    fn centroid_is_arithmetic_mean() {
        let (lat, lon) = centroid(&[(10.0, 20.0), (12.0, 22.0), (14.0, 24.0)]).unwrap();
        assert!((lat - 12.0).abs() < 1e-12);
        assert!((lon - 22.0).abs() < 1e-12);
    }

    #[test]
    fn severity_matches_reference_scenario() {
        // mean 1.05, max 1.2 -> weighted 1.095 -> scaled 2.19
        let s = severity(&[1.0, 1.2, 0.9, 1.1]);
        assert!((s - 2.19).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn severity_is_bounded_and_clamped() {
        assert_eq!(severity(&[]), 0.0);
        assert_eq!(severity(&[20.0, 30.0]), 10.0);
        for mags in [&[0.1][..], &[2.5, 3.0][..], &[5.0; 4][..]] {
            let s = severity(mags);
            assert!((0.0..=10.0).contains(&s));
        }
    }

    #[test]
    fn severity_is_monotone_in_mean_and_max() {
        let base = severity(&[1.0, 1.0, 1.0]);
        assert!(severity(&[1.5, 1.5, 1.5]) > base);
        assert!(severity(&[1.0, 1.0, 2.0]) > base);
    }

    #[test]
    fn creation_confidence_bounds_and_monotonicity() {
        assert_eq!(creation_confidence(0, 0), 0.0);
        assert!((creation_confidence(5, 2) - 0.9).abs() < 1e-9);
        assert_eq!(creation_confidence(10, 5), 1.0);
        assert_eq!(creation_confidence(100, 100), 1.0);

        let mut prev = 0.0;
        for n in 0..12u64 {
            let c = creation_confidence(n, 2);
            assert!((0.0..=1.0).contains(&c));
            assert!(c >= prev);
            prev = c;
        }
    }

    #[test]
    fn ongoing_confidence_caps_components() {
        // Saturate everything: 0.4 + 0.3 + 0.2 + 0.1 = 1.0
        let full = ongoing_confidence(&HazardObservations {
            detection_count: 50,
            unique_user_count: 20,
            days_since_last_detection: 1,
            positive_verifications: 4,
            total_verifications: 4,
        });
        assert!((full - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ongoing_confidence_recency_steps() {
        let obs = |days| HazardObservations {
            detection_count: 0,
            unique_user_count: 0,
            days_since_last_detection: days,
            positive_verifications: 0,
            total_verifications: 0,
        };
        assert!((ongoing_confidence(&obs(7)) - 0.2).abs() < 1e-9);
        assert!((ongoing_confidence(&obs(30)) - 0.15).abs() < 1e-9);
        assert!((ongoing_confidence(&obs(60)) - 0.1).abs() < 1e-9);
        assert!((ongoing_confidence(&obs(61)) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn ongoing_confidence_verification_ratio() {
        let base = HazardObservations {
            detection_count: 0,
            unique_user_count: 0,
            days_since_last_detection: 100,
            positive_verifications: 0,
            total_verifications: 0,
        };
        let none = ongoing_confidence(&base);

        let half = ongoing_confidence(&HazardObservations {
            positive_verifications: 1,
            total_verifications: 2,
            ..base
        });
        assert!((half - none - 0.05).abs() < 1e-9);

        let disputed = ongoing_confidence(&HazardObservations {
            positive_verifications: 0,
            total_verifications: 3,
            ..base
        });
        assert!((disputed - none).abs() < 1e-9);
    }

    #[test]
    fn classification_follows_check_order() {
        // Consistent high magnitude: speed bump, even though max > 3.5.
        assert_eq!(classify(&[3.6, 3.7, 3.65]), HazardType::SpeedBump);
        // Variable with a sharp peak: pothole.
        assert_eq!(classify(&[1.0, 1.5, 4.0]), HazardType::Pothole);
        // Moderate and consistent: rough road.
        assert_eq!(classify(&[1.8, 2.0, 1.9]), HazardType::RoughRoad);
        // Weak signal: unknown.
        assert_eq!(classify(&[0.5, 0.6, 0.4]), HazardType::Unknown);
        assert_eq!(classify(&[]), HazardType::Unknown);
    }

    #[test]
    fn deactivation_requires_both_age_and_low_confidence() {
        assert!(should_deactivate(120, 0.2, 90));
        assert!(!should_deactivate(120, 0.5, 90));
        assert!(!should_deactivate(30, 0.2, 90));
        assert!(!should_deactivate(90, 0.2, 90));
    }

    #[test]
    fn temporal_weight_endpoints_and_midpoint() {
        assert!((temporal_weight(0, 30, 90) - 1.0).abs() < 1e-12);
        assert!((temporal_weight(30, 30, 90) - 1.0).abs() < 1e-12);
        assert!((temporal_weight(90, 30, 90) - 0.1).abs() < 1e-12);
        assert!((temporal_weight(365, 30, 90) - 0.1).abs() < 1e-12);
        // Halfway through the decay range: 1.0 - 0.9 * 0.5
        assert!((temporal_weight(60, 30, 90) - 0.55).abs() < 1e-12);
    }
}
