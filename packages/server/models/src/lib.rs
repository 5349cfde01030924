#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! API request and response types for the road hazard server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use bump_aware_alerts::Alert;
use bump_aware_database_models::{HazardRow, NearbyHazard, NewDetection, SystemStats};
use bump_aware_hazard_models::HazardType;
use bump_aware_pipeline::{DecaySummary, PassSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// A batch of detections uploaded by one client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetectionRequest {
    /// Reporting user (opaque id issued by the external auth service).
    pub user_id: i64,
    /// Detections recorded since the last upload, at most one batch's
    /// worth.
    pub detections: Vec<NewDetection>,
}

/// Response to a detection batch upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetectionResponse {
    /// Detections stored.
    pub accepted: u64,
}

/// A hazard as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHazard {
    /// Unique hazard ID.
    pub id: i64,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Heuristic classification.
    pub hazard_type: HazardType,
    /// Severity (0-10).
    pub severity: f64,
    /// Confidence (0-1).
    pub confidence: f64,
    /// Detections linked to this hazard.
    pub detection_count: i32,
    /// Distinct reporting users.
    pub unique_user_count: i32,
    /// Total verification votes.
    pub verification_count: i32,
    /// Confirm votes.
    pub positive_verifications: i32,
    /// Earliest linked detection (ISO 8601).
    pub first_detected: DateTime<Utc>,
    /// Most recent linked detection (ISO 8601).
    pub last_detected: DateTime<Utc>,
    /// Whether the hazard is visible to clients.
    pub is_active: bool,
    /// Whether the hazard has been confirmed by verifications.
    pub is_verified: bool,
}

impl From<HazardRow> for ApiHazard {
    fn from(row: HazardRow) -> Self {
        Self {
            id: row.id,
            latitude: row.latitude,
            longitude: row.longitude,
            hazard_type: row.hazard_type,
            severity: row.severity,
            confidence: row.confidence,
            detection_count: row.detection_count,
            unique_user_count: row.unique_user_count,
            verification_count: row.verification_count,
            positive_verifications: row.positive_verifications,
            first_detected: row.first_detected,
            last_detected: row.last_detected,
            is_active: row.is_active,
            is_verified: row.is_verified,
        }
    }
}

/// A hazard near a query point, annotated with its distance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNearbyHazard {
    /// Unique hazard ID.
    pub id: i64,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Heuristic classification.
    pub hazard_type: HazardType,
    /// Severity (0-10).
    pub severity: f64,
    /// Confidence (0-1).
    pub confidence: f64,
    /// Great-circle distance from the query point, in meters.
    pub distance_meters: f64,
}

impl From<NearbyHazard> for ApiNearbyHazard {
    fn from(hazard: NearbyHazard) -> Self {
        Self {
            id: hazard.id,
            latitude: hazard.latitude,
            longitude: hazard.longitude,
            hazard_type: hazard.hazard_type,
            severity: hazard.severity,
            confidence: hazard.confidence,
            distance_meters: hazard.distance_meters,
        }
    }
}

/// Query parameters for the nearby hazards endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQueryParams {
    /// Query point latitude.
    pub latitude: f64,
    /// Query point longitude.
    pub longitude: f64,
    /// Search radius in meters.
    pub radius_meters: Option<f64>,
    /// Minimum hazard confidence to include.
    pub min_confidence: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Query parameters for the map bounds endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: String,
    /// Minimum hazard confidence to include.
    pub min_confidence: Option<f64>,
}

/// Query parameters for the route alerts endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQueryParams {
    /// Client latitude.
    pub latitude: f64,
    /// Client longitude.
    pub longitude: f64,
    /// Client speed in meters per second.
    pub speed_mps: f64,
    /// Client heading in degrees.
    pub heading: Option<f64>,
    /// Maximum alerts to return.
    pub max_alerts: Option<u32>,
}

/// A ranked route alert as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAlert {
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
    /// Distance from the client, in meters.
    pub distance_meters: f64,
    /// Urgency score; higher means warn sooner.
    pub priority: f64,
    /// Rendered warning text.
    pub message: String,
}

impl From<Alert> for ApiAlert {
    fn from(alert: Alert) -> Self {
        Self {
            hazard_id: alert.hazard_id,
            latitude: alert.latitude,
            longitude: alert.longitude,
            hazard_type: alert.hazard_type,
            severity: alert.severity,
            confidence: alert.confidence,
            distance_meters: alert.distance_meters,
            priority: alert.priority,
            message: alert.message,
        }
    }
}

/// Body of a verification vote request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Voting user (opaque id issued by the external auth service).
    pub user_id: i64,
    /// `true` confirms the hazard, `false` disputes it.
    pub is_valid: bool,
    /// Optional free-text note.
    pub comment: Option<String>,
}

/// Result of one aggregation pass, as returned by the admin endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPassSummary {
    /// Unprocessed detections fetched.
    pub detections_total: usize,
    /// Detections linked to a hazard.
    pub detections_processed: usize,
    /// Detections marked as noise.
    pub noise_count: usize,
    /// New hazards created.
    pub hazards_created: usize,
    /// Clusters found by the density scan.
    pub clusters_found: usize,
}

impl From<PassSummary> for ApiPassSummary {
    fn from(summary: PassSummary) -> Self {
        Self {
            detections_total: summary.detections_total,
            detections_processed: summary.detections_processed,
            noise_count: summary.noise_count,
            hazards_created: summary.hazards_created,
            clusters_found: summary.clusters_found,
        }
    }
}

/// Result of one decay sweep, as returned by the admin endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDecaySummary {
    /// Active hazards examined.
    pub examined: usize,
    /// Hazards flipped inactive.
    pub deactivated: usize,
}

impl From<DecaySummary> for ApiDecaySummary {
    fn from(summary: DecaySummary) -> Self {
        Self {
            examined: summary.examined,
            deactivated: summary.deactivated,
        }
    }
}

/// Detection and hazard counters for the admin stats endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    /// All detections ever stored.
    pub total_detections: i64,
    /// Detections already consumed by an aggregation pass.
    pub processed_detections: i64,
    /// All hazards ever created.
    pub total_hazards: i64,
    /// Hazards currently visible to clients.
    pub active_hazards: i64,
}

impl From<SystemStats> for ApiStats {
    fn from(stats: SystemStats) -> Self {
        Self {
            total_detections: stats.total_detections,
            processed_detections: stats.processed_detections,
            total_hazards: stats.total_hazards,
            active_hazards: stats.active_hazards,
        }
    }
}
