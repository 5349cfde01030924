#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Route alert ranking for moving clients.
//!
//! Given a client's position and speed, computes a speed-dependent search
//! radius, pulls nearby active hazards, gives each its own severity-scaled
//! trigger distance, scores the in-range ones by urgency, suppresses
//! geographically redundant warnings, and renders the survivors into
//! human-readable messages.

use bump_aware_config::Settings;
use bump_aware_database::{DbError, queries};
use bump_aware_database_models::NearbyHazard;
use bump_aware_geo::distance_meters;
use bump_aware_hazard_models::{HazardType, SeverityBucket};
use serde::{Deserialize, Serialize};
use switchy_database::Database;

/// Base alert lead time in seconds, before severity scaling.
const BASE_LEAD_TIME_SECONDS: f64 = 20.0;

/// Worst-case severity, used to bound the candidate search radius.
const MAX_SEVERITY: f64 = 10.0;

/// Errors from an alert query.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Malformed or out-of-range query input. Surfaced to the caller,
    /// never retried.
    #[error("invalid {field}: {value}")]
    Validation {
        /// Which input failed.
        field: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Storage failure during the candidate query.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

/// One alert query from a moving client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    /// Client latitude in degrees.
    pub latitude: f64,
    /// Client longitude in degrees.
    pub longitude: f64,
    /// Client speed in meters per second.
    pub speed_mps: f64,
    /// Client heading in degrees, if known. Currently unused by ranking
    /// but validated when present.
    pub heading: Option<f64>,
    /// Maximum alerts to return.
    pub max_alerts: u32,
}

/// A ranked, rendered warning for one hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// The hazard being warned about.
    pub hazard_id: i64,
    /// Hazard centroid latitude.
    pub latitude: f64,
    /// Hazard centroid longitude.
    pub longitude: f64,
    /// Hazard classification.
    pub hazard_type: HazardType,
    /// Hazard severity (0-10).
    pub severity: f64,
    /// Hazard confidence (0-1).
    pub confidence: f64,
    /// Distance from the client, in meters, to 1 decimal place.
    pub distance_meters: f64,
    /// Urgency score; higher means warn sooner.
    pub priority: f64,
    /// Rendered warning text.
    pub message: String,
}

/// Ranks alerts for a client's current position and speed.
///
/// # Errors
///
/// Returns [`AlertError::Validation`] for out-of-range inputs, or
/// [`AlertError::Storage`] if the candidate query fails.
pub async fn rank_alerts(
    db: &dyn Database,
    query: &AlertQuery,
    settings: &Settings,
) -> Result<Vec<Alert>, AlertError> {
    validate_query(query)?;

    // Worst-case severity bounds the spatial query; each candidate then
    // gets its own (tighter) trigger distance.
    let search_radius = alert_distance(query.speed_mps, MAX_SEVERITY, settings);

    let candidates = queries::nearby_active_hazards(
        db,
        query.latitude,
        query.longitude,
        search_radius,
        0.0,
        query.max_alerts.saturating_mul(2),
    )
    .await?;

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut in_range: Vec<Alert> = candidates
        .iter()
        .filter_map(|hazard| build_candidate(hazard, query.speed_mps, settings))
        .collect();

    log::debug!(
        "{} of {} candidate hazards in range at {:.1} m/s",
        in_range.len(),
        candidates.len(),
        query.speed_mps
    );

    sort_by_priority(&mut in_range);
    let mut accepted = suppress(in_range, settings.alert_suppression_radius_meters);
    accepted.truncate(query.max_alerts as usize);

    Ok(accepted)
}

/// Trigger distance for a hazard of the given severity at the given
/// speed.
///
/// Base lead time of 20 seconds scaled by a severity factor in
/// [0.5, 1.0], multiplied by speed, clamped to the configured bounds, and
/// rounded to 1 decimal place. Higher severity warns earlier.
#[must_use]
pub fn alert_distance(speed_mps: f64, severity: f64, settings: &Settings) -> f64 {
    let severity_factor = 0.5 + (severity / 10.0) * 0.5;
    let lead_time = BASE_LEAD_TIME_SECONDS * severity_factor;

    let distance = (speed_mps * lead_time).clamp(
        settings.min_alert_distance_meters,
        settings.max_alert_distance_meters,
    );

    round_1dp(distance)
}

/// Urgency score: `severity x confidence x (1 - distance/max)`, rounded
/// to 3 decimal places. Zero at the maximum alert distance regardless of
/// severity.
#[must_use]
pub fn priority_score(
    distance_meters: f64,
    severity: f64,
    confidence: f64,
    settings: &Settings,
) -> f64 {
    let max = settings.max_alert_distance_meters;
    let proximity = 1.0 - distance_meters.min(max) / max;
    let priority = severity * confidence * proximity;
    (priority * 1000.0).round() / 1000.0
}

/// Builds an in-range alert candidate, or `None` when the hazard sits
/// beyond its own trigger distance.
fn build_candidate(hazard: &NearbyHazard, speed_mps: f64, settings: &Settings) -> Option<Alert> {
    let trigger = alert_distance(speed_mps, hazard.severity, settings);
    if hazard.distance_meters > trigger {
        return None;
    }

    // Priority works on the exact distance; the 1 dp rounding is only for
    // the reported field and message text.
    Some(Alert {
        hazard_id: hazard.id,
        latitude: hazard.latitude,
        longitude: hazard.longitude,
        hazard_type: hazard.hazard_type,
        severity: hazard.severity,
        confidence: hazard.confidence,
        distance_meters: round_1dp(hazard.distance_meters),
        priority: priority_score(
            hazard.distance_meters,
            hazard.severity,
            hazard.confidence,
            settings,
        ),
        message: render_message(hazard.hazard_type, hazard.distance_meters, hazard.severity),
    })
}

/// Sorts by priority descending, ties broken by distance ascending then
/// hazard id so the ordering is stable across runs.
fn sort_by_priority(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then(a.distance_meters.total_cmp(&b.distance_meters))
            .then(a.hazard_id.cmp(&b.hazard_id))
    });
}

/// Greedy spatial suppression over priority-sorted candidates: a
/// candidate survives only if it is farther than the suppression radius
/// from every already-accepted alert. At most one alert per suppression
/// neighborhood, and it is the highest-priority one.
fn suppress(sorted: Vec<Alert>, suppression_radius_meters: f64) -> Vec<Alert> {
    let mut accepted: Vec<Alert> = Vec::with_capacity(sorted.len());

    for candidate in sorted {
        let too_close = accepted.iter().any(|kept| {
            distance_meters(
                candidate.latitude,
                candidate.longitude,
                kept.latitude,
                kept.longitude,
            ) < suppression_radius_meters
        });
        if !too_close {
            accepted.push(candidate);
        }
    }

    accepted
}

/// Renders `"<Severity> <type> ahead in <distance>"` — meters below
/// 1000 m, kilometers to 1 decimal place beyond.
#[must_use]
pub fn render_message(hazard_type: HazardType, distance_meters: f64, severity: f64) -> String {
    let distance_str = if distance_meters < 1000.0 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = distance_meters as i64;
        format!("{whole}m")
    } else {
        format!("{:.1}km", distance_meters / 1000.0)
    };

    let bucket = SeverityBucket::from_severity(severity);

    format!(
        "{} {} ahead in {distance_str}",
        bucket.capitalized(),
        hazard_type.display_phrase()
    )
}

fn round_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Checks coordinate, speed, and heading ranges.
fn validate_query(query: &AlertQuery) -> Result<(), AlertError> {
    if !(-90.0..=90.0).contains(&query.latitude) {
        return Err(AlertError::Validation {
            field: "latitude",
            value: query.latitude,
        });
    }
    if !(-180.0..=180.0).contains(&query.longitude) {
        return Err(AlertError::Validation {
            field: "longitude",
            value: query.longitude,
        });
    }
    if !query.speed_mps.is_finite() || query.speed_mps < 0.0 {
        return Err(AlertError::Validation {
            field: "speed_mps",
            value: query.speed_mps,
        });
    }
    if let Some(heading) = query.heading {
        if !(0.0..=360.0).contains(&heading) {
            return Err(AlertError::Validation {
                field: "heading",
                value: heading,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nearby(id: i64, lat: f64, lon: f64, severity: f64, distance: f64) -> NearbyHazard {
        NearbyHazard {
            id,
            latitude: lat,
            longitude: lon,
            hazard_type: HazardType::Pothole,
            severity,
            confidence: 0.8,
            distance_meters: distance,
        }
    }

    #[test]
    fn trigger_distance_matches_reference_scenario() {
        // 20 m/s, severity 8: 20 x 20 x (0.5 + 0.4) = 360 m.
        let settings = Settings::default();
        let d = alert_distance(20.0, 8.0, &settings);
        assert!((d - 360.0).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn trigger_distance_clamps_to_configured_bounds() {
        let settings = Settings::default();
        // Standing still: clamped up to the minimum.
        assert!((alert_distance(0.0, 5.0, &settings) - 50.0).abs() < 1e-9);
        // Very fast, max severity: clamped down to the maximum.
        assert!((alert_distance(100.0, 10.0, &settings) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn severity_eight_hazard_at_300m_is_in_range() {
        let settings = Settings::default();
        let hazard = nearby(1, 45.0, -122.0, 8.0, 300.0);
        let alert = build_candidate(&hazard, 20.0, &settings).unwrap();
        // priority = 8 x 0.8 x (1 - 300/1000)
        assert!((alert.priority - 4.48).abs() < 1e-9, "got {}", alert.priority);
    }

    #[test]
    fn priority_uses_the_exact_distance_not_the_reported_one() {
        let settings = Settings::default();
        let hazard = NearbyHazard {
            id: 1,
            latitude: 45.0,
            longitude: -122.0,
            hazard_type: HazardType::Pothole,
            severity: 9.0,
            confidence: 1.0,
            distance_meters: 333.38,
        };
        let alert = build_candidate(&hazard, 20.0, &settings).unwrap();

        // Reported distance is rounded for display.
        assert!((alert.distance_meters - 333.4).abs() < 1e-9);
        // 9 x 1.0 x (1 - 333.38/1000) = 5.99958 -> 6.000; feeding the
        // rounded 333.4 in would give 5.999.
        assert!((alert.priority - 6.0).abs() < 1e-9, "got {}", alert.priority);
    }

    #[test]
    fn hazard_beyond_its_trigger_distance_is_dropped() {
        let settings = Settings::default();
        // Severity 0 at 20 m/s triggers at 200 m; hazard sits at 300 m.
        let hazard = nearby(1, 45.0, -122.0, 0.0, 300.0);
        assert!(build_candidate(&hazard, 20.0, &settings).is_none());
    }

    #[test]
    fn priority_is_zero_at_maximum_distance() {
        let settings = Settings::default();
        assert_eq!(priority_score(1000.0, 10.0, 1.0, &settings), 0.0);
        assert_eq!(priority_score(5000.0, 10.0, 1.0, &settings), 0.0);
    }

    #[test]
    fn suppression_keeps_only_the_highest_priority_neighbor() {
        let settings = Settings::default();
        // Two hazards ~100 m apart, suppression radius 500 m.
        let near = nearby(1, 45.0, -122.0, 9.0, 100.0);
        let other = nearby(2, 45.0009, -122.0, 5.0, 150.0);

        let mut candidates = vec![
            build_candidate(&other, 20.0, &settings).unwrap(),
            build_candidate(&near, 20.0, &settings).unwrap(),
        ];
        sort_by_priority(&mut candidates);
        let accepted = suppress(candidates, settings.alert_suppression_radius_meters);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].hazard_id, 1);
    }

    #[test]
    fn accepted_alerts_are_pairwise_separated() {
        let settings = Settings::default();
        // Three hazards, two neighborhoods ~2 km apart.
        let a = nearby(1, 45.0, -122.0, 9.0, 100.0);
        let b = nearby(2, 45.001, -122.0, 4.0, 200.0);
        let c = nearby(3, 45.02, -122.0, 8.0, 300.0);

        let mut candidates: Vec<Alert> = [a, b, c]
            .iter()
            .filter_map(|h| build_candidate(h, 30.0, &settings))
            .collect();
        sort_by_priority(&mut candidates);
        let accepted = suppress(candidates, settings.alert_suppression_radius_meters);

        for (i, first) in accepted.iter().enumerate() {
            for second in &accepted[i + 1..] {
                let d = distance_meters(
                    first.latitude,
                    first.longitude,
                    second.latitude,
                    second.longitude,
                );
                assert!(d > settings.alert_suppression_radius_meters);
            }
        }
        assert_eq!(accepted.len(), 2);
    }

    #[test]
    fn message_renders_meters_and_kilometers() {
        assert_eq!(
            render_message(HazardType::Pothole, 300.0, 8.0),
            "Severe pothole ahead in 300m"
        );
        assert_eq!(
            render_message(HazardType::SpeedBump, 999.9, 5.0),
            "Moderate speed bump ahead in 999m"
        );
        assert_eq!(
            render_message(HazardType::RoughRoad, 1500.0, 2.0),
            "Minor rough road ahead in 1.5km"
        );
        assert_eq!(
            render_message(HazardType::Unknown, 100.0, 7.0),
            "Severe road hazard ahead in 100m"
        );
    }

    #[test]
    fn out_of_range_inputs_are_rejected() {
        let valid = AlertQuery {
            latitude: 45.0,
            longitude: -122.0,
            speed_mps: 10.0,
            heading: None,
            max_alerts: 5,
        };
        assert!(validate_query(&valid).is_ok());

        for bad in [
            AlertQuery { latitude: 91.0, ..valid },
            AlertQuery { longitude: -200.0, ..valid },
            AlertQuery { speed_mps: -1.0, ..valid },
            AlertQuery { heading: Some(400.0), ..valid },
        ] {
            assert!(validate_query(&bad).is_err());
        }
    }
}
