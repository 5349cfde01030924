#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Runtime tunables for the aggregation pipeline and alert ranker.
//!
//! Loaded once from the environment at process start and passed by
//! reference into the components that need them. A present but malformed
//! or out-of-range value is fatal — the server refuses to start rather
//! than silently running with defaults.

use std::env;
use std::str::FromStr;

/// Error raised for a malformed or out-of-range tunable at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The environment variable was set but did not parse as its type.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// The parsed value violates a range constraint.
    #[error("out-of-range value for {name}: {reason}")]
    OutOfRange {
        /// Environment variable name.
        name: &'static str,
        /// What constraint was violated.
        reason: String,
    },
}

/// All recognized tunables, with the defaults the system ships with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Minimum detections required to form a hazard (DBSCAN `min_points`).
    pub min_detections_for_hazard: usize,
    /// Spatial clustering radius in meters (DBSCAN `eps`).
    pub spatial_cluster_radius_meters: f64,
    /// Detections younger than this many days carry full temporal weight.
    pub temporal_weight_days: i64,
    /// Days after which a quiet, low-confidence hazard is deactivated;
    /// also the fully-decayed end of the temporal weight ramp.
    pub confidence_decay_days: i64,
    /// Detections with worse GPS accuracy than this are rejected outright.
    pub max_gps_accuracy_meters: f64,
    /// Lower clamp for the computed alert trigger distance.
    pub min_alert_distance_meters: f64,
    /// Upper clamp for the computed alert trigger distance and the
    /// distance normalization bound for priority.
    pub max_alert_distance_meters: f64,
    /// Minimum spacing between two simultaneously raised alerts.
    pub alert_suppression_radius_meters: f64,
    /// Maximum unprocessed detections consumed by one aggregation pass.
    pub aggregation_batch_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_detections_for_hazard: 3,
            spatial_cluster_radius_meters: 15.0,
            temporal_weight_days: 30,
            confidence_decay_days: 90,
            max_gps_accuracy_meters: 10.0,
            min_alert_distance_meters: 50.0,
            max_alert_distance_meters: 1000.0,
            alert_suppression_radius_meters: 500.0,
            aggregation_batch_limit: 10_000,
        }
    }
}

impl Settings {
    /// Loads settings from the environment, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is set to an unparsable or
    /// out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            min_detections_for_hazard: read_env("MIN_DETECTIONS_FOR_HAZARD", 3)?,
            spatial_cluster_radius_meters: read_env("SPATIAL_CLUSTER_RADIUS_METERS", 15.0)?,
            temporal_weight_days: read_env("TEMPORAL_WEIGHT_DAYS", 30)?,
            confidence_decay_days: read_env("CONFIDENCE_DECAY_DAYS", 90)?,
            max_gps_accuracy_meters: read_env("MAX_GPS_ACCURACY_METERS", 10.0)?,
            min_alert_distance_meters: read_env("MIN_ALERT_DISTANCE_METERS", 50.0)?,
            max_alert_distance_meters: read_env("MAX_ALERT_DISTANCE_METERS", 1000.0)?,
            alert_suppression_radius_meters: read_env("ALERT_SUPPRESSION_RADIUS_METERS", 500.0)?,
            aggregation_batch_limit: read_env("AGGREGATION_BATCH_LIMIT", 10_000)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the cross-field range constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for non-positive radii or
    /// windows, or an inverted alert distance range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_detections_for_hazard == 0 {
            return Err(ConfigError::OutOfRange {
                name: "MIN_DETECTIONS_FOR_HAZARD",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.spatial_cluster_radius_meters <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "SPATIAL_CLUSTER_RADIUS_METERS",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_gps_accuracy_meters <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "MAX_GPS_ACCURACY_METERS",
                reason: "must be positive".to_string(),
            });
        }
        if self.temporal_weight_days <= 0 || self.confidence_decay_days <= 0 {
            return Err(ConfigError::OutOfRange {
                name: "CONFIDENCE_DECAY_DAYS",
                reason: "decay windows must be positive".to_string(),
            });
        }
        if self.temporal_weight_days >= self.confidence_decay_days {
            return Err(ConfigError::OutOfRange {
                name: "TEMPORAL_WEIGHT_DAYS",
                reason: format!(
                    "fresh window ({}) must be shorter than the decay window ({})",
                    self.temporal_weight_days, self.confidence_decay_days
                ),
            });
        }
        if self.min_alert_distance_meters <= 0.0
            || self.min_alert_distance_meters >= self.max_alert_distance_meters
        {
            return Err(ConfigError::OutOfRange {
                name: "MIN_ALERT_DISTANCE_METERS",
                reason: format!(
                    "must be positive and below MAX_ALERT_DISTANCE_METERS ({})",
                    self.max_alert_distance_meters
                ),
            });
        }
        if self.alert_suppression_radius_meters < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "ALERT_SUPPRESSION_RADIUS_METERS",
                reason: "must not be negative".to_string(),
            });
        }
        if self.aggregation_batch_limit == 0 {
            return Err(ConfigError::OutOfRange {
                name: "AGGREGATION_BATCH_LIMIT",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Reads one variable, using `default` when unset. A set-but-unparsable
/// value is an error, never a silent fallback.
fn read_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn inverted_alert_range_is_rejected() {
        let settings = Settings {
            min_alert_distance_meters: 2000.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_cluster_radius_is_rejected() {
        let settings = Settings {
            spatial_cluster_radius_meters: 0.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn fresh_window_must_precede_decay_window() {
        let settings = Settings {
            temporal_weight_days: 90,
            confidence_decay_days: 90,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_min_detections_is_rejected() {
        let settings = Settings {
            min_detections_for_hazard: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let value: Result<f64, ConfigError> = read_env("BUMP_AWARE_TEST_UNSET_VALUE", 12.5);
        assert!((value.unwrap() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn set_but_unparsable_value_is_rejected() {
        // SAFETY: var name is unique to this test.
        unsafe { env::set_var("BUMP_AWARE_TEST_BAD_VALUE", "not-a-number") };
        let value: Result<f64, ConfigError> = read_env("BUMP_AWARE_TEST_BAD_VALUE", 1.0);
        assert!(matches!(value, Err(ConfigError::Invalid { .. })));
        // SAFETY: same var, same test.
        unsafe { env::remove_var("BUMP_AWARE_TEST_BAD_VALUE") };
    }
}
