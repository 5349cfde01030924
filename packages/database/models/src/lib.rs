#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved
//! from the `PostGIS` database. They are distinct from the API response
//! types in `bump_aware_server_models`, which can evolve independently of
//! the storage schema.

use bump_aware_hazard_models::HazardType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

/// One raw accelerometer or gyroscope sample attached to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// X-axis reading.
    pub x: f64,
    /// Y-axis reading.
    pub y: f64,
    /// Z-axis reading.
    pub z: f64,
    /// When the sample was taken on-device.
    pub timestamp: DateTime<Utc>,
}

/// A detection as submitted by a client, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetection {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// GPS accuracy radius in meters.
    pub accuracy: f64,
    /// Bump magnitude in g.
    pub magnitude: f64,
    /// When the bump occurred.
    pub timestamp: DateTime<Utc>,
    /// Raw accelerometer sample at the moment of detection.
    pub accelerometer: SensorSample,
    /// Raw gyroscope sample at the moment of detection.
    pub gyroscope: SensorSample,
}

/// The slice of a detection row the aggregation pipeline works with.
///
/// The raw sensor triples stay in the database; clustering and scoring
/// only need position, quality, magnitude, time, and reporter identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRow {
    /// Primary key.
    pub id: i64,
    /// Reporting user (opaque id issued by the external auth service).
    pub user_id: i64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// GPS accuracy radius in meters.
    pub accuracy: f64,
    /// Bump magnitude in g.
    pub magnitude: f64,
    /// When the bump occurred.
    pub timestamp: DateTime<Utc>,
}

/// A hazard row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRow {
    /// Primary key.
    pub id: i64,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Heuristic classification.
    pub hazard_type: HazardType,
    /// Severity on the 0-10 scale.
    pub severity: f64,
    /// Confidence on the 0-1 scale.
    pub confidence: f64,
    /// Detections linked to this hazard (monotone non-decreasing).
    pub detection_count: i32,
    /// Distinct reporting users among linked detections.
    pub unique_user_count: i32,
    /// Total verification votes.
    pub verification_count: i32,
    /// Confirm votes.
    pub positive_verifications: i32,
    /// Earliest linked detection.
    pub first_detected: DateTime<Utc>,
    /// Most recent linked detection.
    pub last_detected: DateTime<Utc>,
    /// Whether the hazard is visible to clients.
    pub is_active: bool,
    /// Whether the hazard has been confirmed by verifications.
    pub is_verified: bool,
}

/// Fields computed by the aggregation pipeline for a freshly formed
/// hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHazard {
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Heuristic classification from the cluster's magnitudes.
    pub hazard_type: HazardType,
    /// Severity on the 0-10 scale.
    pub severity: f64,
    /// Creation-time confidence on the 0-1 scale.
    pub confidence: f64,
    /// Number of admitted detections in the founding cluster.
    pub detection_count: i32,
    /// Distinct users among admitted detections.
    pub unique_user_count: i32,
    /// Earliest admitted detection.
    pub first_detected: DateTime<Utc>,
    /// Latest admitted detection.
    pub last_detected: DateTime<Utc>,
}

/// An active hazard near a query point, annotated with its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyHazard {
    /// Primary key.
    pub id: i64,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Heuristic classification.
    pub hazard_type: HazardType,
    /// Severity on the 0-10 scale.
    pub severity: f64,
    /// Confidence on the 0-1 scale.
    pub confidence: f64,
    /// Great-circle distance from the query point, in meters.
    pub distance_meters: f64,
}

/// Verification vote tallies for one hazard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTally {
    /// All votes.
    pub total: u64,
    /// Confirm votes.
    pub positive: u64,
}

/// Detection and hazard counters for the admin stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    /// All detections ever stored.
    pub total_detections: i64,
    /// Detections already consumed by an aggregation pass.
    pub processed_detections: i64,
    /// All hazards ever created.
    pub total_hazards: i64,
    /// Hazards currently visible to clients.
    pub active_hazards: i64,
}
