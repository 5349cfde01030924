#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Road hazard taxonomy types shared across the bump-aware system.
//!
//! Defines the canonical hazard type classification and the severity
//! bucketing used for user-facing alert text. All crates that touch a
//! hazard — the aggregation pipeline, the alert ranker, the API layer —
//! speak in these types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Classification of an aggregated road hazard.
///
/// Assigned heuristically from the magnitude distribution of the
/// detections that formed the hazard; there is no learned model behind
/// this.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HazardType {
    /// Sharp single impact with a high peak magnitude.
    Pothole,
    /// Strong but consistent impact profile across reports.
    SpeedBump,
    /// Sustained moderate vibration (broken or unpaved surface).
    RoughRoad,
    /// Magnitude pattern doesn't match any known profile.
    Unknown,
}

impl HazardType {
    /// Returns the phrase used for this hazard type in alert messages.
    #[must_use]
    pub const fn display_phrase(self) -> &'static str {
        match self {
            Self::Pothole => "pothole",
            Self::SpeedBump => "speed bump",
            Self::RoughRoad => "rough road",
            Self::Unknown => "road hazard",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pothole,
            Self::SpeedBump,
            Self::RoughRoad,
            Self::Unknown,
        ]
    }
}

/// Severity descriptor bucket for a continuous 0-10 severity score.
///
/// Used only for rendering alert text; the numeric score is what gets
/// stored and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeverityBucket {
    /// Severity below 4.
    Minor,
    /// Severity in [4, 7).
    Moderate,
    /// Severity 7 and above.
    Severe,
}

impl SeverityBucket {
    /// Buckets a continuous severity score.
    #[must_use]
    pub fn from_severity(severity: f64) -> Self {
        if severity >= 7.0 {
            Self::Severe
        } else if severity >= 4.0 {
            Self::Moderate
        } else {
            Self::Minor
        }
    }

    /// Returns the descriptor with its first letter capitalized, as used
    /// at the start of an alert message.
    #[must_use]
    pub const fn capitalized(self) -> &'static str {
        match self {
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hazard_type_wire_names_are_snake_case() {
        assert_eq!(HazardType::Pothole.as_ref(), "pothole");
        assert_eq!(HazardType::SpeedBump.as_ref(), "speed_bump");
        assert_eq!(HazardType::RoughRoad.as_ref(), "rough_road");
        assert_eq!(HazardType::Unknown.as_ref(), "unknown");
    }

    #[test]
    fn hazard_type_parses_from_wire_name() {
        for ty in HazardType::all() {
            let parsed: HazardType = ty.as_ref().parse().unwrap();
            assert_eq!(parsed, *ty);
        }
    }

    #[test]
    fn unknown_type_displays_as_generic_hazard() {
        assert_eq!(HazardType::Unknown.display_phrase(), "road hazard");
    }

    #[test]
    fn severity_bucket_boundaries() {
        assert_eq!(SeverityBucket::from_severity(0.0), SeverityBucket::Minor);
        assert_eq!(SeverityBucket::from_severity(3.99), SeverityBucket::Minor);
        assert_eq!(SeverityBucket::from_severity(4.0), SeverityBucket::Moderate);
        assert_eq!(SeverityBucket::from_severity(6.99), SeverityBucket::Moderate);
        assert_eq!(SeverityBucket::from_severity(7.0), SeverityBucket::Severe);
        assert_eq!(SeverityBucket::from_severity(10.0), SeverityBucket::Severe);
    }
}
