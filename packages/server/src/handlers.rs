//! HTTP handler functions for the road hazard API.

use actix_web::{HttpResponse, web};
use bump_aware_alerts::{AlertError, AlertQuery, rank_alerts};
use bump_aware_database::{DbError, queries};
use bump_aware_database_models::{BoundingBox, NewDetection};
use bump_aware_pipeline::{run_aggregation_pass, run_decay_sweep};
use bump_aware_server_models::{
    AlertQueryParams, ApiAlert, ApiDecaySummary, ApiHazard, ApiHealth, ApiNearbyHazard,
    ApiPassSummary, ApiStats, BatchDetectionRequest, BatchDetectionResponse, BoundsQueryParams,
    NearbyQueryParams, VerifyRequest,
};

use crate::AppState;

/// Default search radius for the nearby hazards endpoint, in meters.
const DEFAULT_NEARBY_RADIUS_METERS: f64 = 500.0;

/// Largest radius the nearby hazards endpoint will search.
const MAX_NEARBY_RADIUS_METERS: f64 = 5000.0;

/// Default result limit for the nearby hazards endpoint.
const DEFAULT_NEARBY_LIMIT: u32 = 100;

/// Default number of alerts returned by the route alerts endpoint.
const DEFAULT_MAX_ALERTS: u32 = 5;

/// `GET /api/v1/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/v1/detections/batch`
///
/// Stores a batch of detections from one client, unprocessed, for the
/// next aggregation pass to consume.
pub async fn upload_detections(
    state: web::Data<AppState>,
    body: web::Json<BatchDetectionRequest>,
) -> HttpResponse {
    if body.detections.is_empty() {
        return bad_request("Detection batch is empty");
    }

    if let Some(reason) = body.detections.iter().find_map(invalid_detection) {
        return bad_request(reason);
    }

    match queries::insert_detections(state.db.as_ref(), body.user_id, &body.detections).await {
        Ok(accepted) => HttpResponse::Created().json(BatchDetectionResponse { accepted }),
        Err(e) => {
            log::error!("Failed to store detections: {e}");
            internal_error("Failed to store detections")
        }
    }
}

/// `GET /api/v1/hazards/nearby`
///
/// Active hazards near a point, nearest first.
pub async fn nearby_hazards(
    state: web::Data<AppState>,
    params: web::Query<NearbyQueryParams>,
) -> HttpResponse {
    if !(-90.0..=90.0).contains(&params.latitude) || !(-180.0..=180.0).contains(&params.longitude) {
        return bad_request("Coordinates out of range");
    }

    let radius = params
        .radius_meters
        .unwrap_or(DEFAULT_NEARBY_RADIUS_METERS)
        .clamp(0.0, MAX_NEARBY_RADIUS_METERS);
    let min_confidence = params.min_confidence.unwrap_or(0.0).clamp(0.0, 1.0);
    let limit = params.limit.unwrap_or(DEFAULT_NEARBY_LIMIT);

    match queries::nearby_active_hazards(
        state.db.as_ref(),
        params.latitude,
        params.longitude,
        radius,
        min_confidence,
        limit,
    )
    .await
    {
        Ok(hazards) => {
            let api: Vec<ApiNearbyHazard> =
                hazards.into_iter().map(ApiNearbyHazard::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => {
            log::error!("Failed to query nearby hazards: {e}");
            internal_error("Failed to query nearby hazards")
        }
    }
}

/// `GET /api/v1/hazards/bounds`
///
/// Active hazards within a map viewport.
pub async fn hazards_in_bounds(
    state: web::Data<AppState>,
    params: web::Query<BoundsQueryParams>,
) -> HttpResponse {
    let Some(bbox) = parse_bbox(&params.bbox) else {
        return bad_request("Invalid bbox; expected west,south,east,north");
    };

    let min_confidence = params.min_confidence.unwrap_or(0.0).clamp(0.0, 1.0);

    match queries::hazards_in_bounds(state.db.as_ref(), &bbox, min_confidence).await {
        Ok(rows) => {
            let api: Vec<ApiHazard> = rows.into_iter().map(ApiHazard::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => {
            log::error!("Failed to query hazards in bounds: {e}");
            internal_error("Failed to query hazards in bounds")
        }
    }
}

/// `GET /api/v1/hazards/alerts`
///
/// Ranked route alerts for a moving client.
pub async fn route_alerts(
    state: web::Data<AppState>,
    params: web::Query<AlertQueryParams>,
) -> HttpResponse {
    let query = AlertQuery {
        latitude: params.latitude,
        longitude: params.longitude,
        speed_mps: params.speed_mps,
        heading: params.heading,
        max_alerts: params.max_alerts.unwrap_or(DEFAULT_MAX_ALERTS),
    };

    match rank_alerts(state.db.as_ref(), &query, &state.settings).await {
        Ok(alerts) => {
            let api: Vec<ApiAlert> = alerts.into_iter().map(ApiAlert::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(AlertError::Validation { field, value }) => {
            bad_request(&format!("Invalid {field}: {value}"))
        }
        Err(AlertError::Storage(e)) => {
            log::error!("Failed to rank alerts: {e}");
            internal_error("Failed to rank alerts")
        }
    }
}

/// `GET /api/v1/hazards/{id}`
pub async fn get_hazard(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let hazard_id = path.into_inner();

    match queries::get_hazard(state.db.as_ref(), hazard_id).await {
        Ok(Some(row)) => HttpResponse::Ok().json(ApiHazard::from(row)),
        Ok(None) => not_found("Hazard not found"),
        Err(e) => {
            log::error!("Failed to fetch hazard {hazard_id}: {e}");
            internal_error("Failed to fetch hazard")
        }
    }
}

/// `POST /api/v1/hazards/{id}/verify`
///
/// Records a confirm/dispute vote. One vote per user per hazard; a
/// repeat vote is a conflict.
pub async fn verify_hazard(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<VerifyRequest>,
) -> HttpResponse {
    let hazard_id = path.into_inner();

    match queries::get_hazard(state.db.as_ref(), hazard_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Hazard not found"),
        Err(e) => {
            log::error!("Failed to fetch hazard {hazard_id}: {e}");
            return internal_error("Failed to fetch hazard");
        }
    }

    let result = queries::insert_verification(
        state.db.as_ref(),
        hazard_id,
        body.user_id,
        body.is_valid,
        body.comment.as_deref(),
    )
    .await;

    match result {
        Ok(()) => match queries::get_hazard(state.db.as_ref(), hazard_id).await {
            Ok(Some(row)) => HttpResponse::Ok().json(ApiHazard::from(row)),
            Ok(None) => not_found("Hazard not found"),
            Err(e) => {
                log::error!("Failed to fetch hazard {hazard_id} after verification: {e}");
                internal_error("Failed to fetch hazard")
            }
        },
        Err(DbError::DuplicateVerification { .. }) => HttpResponse::Conflict().json(
            serde_json::json!({ "error": "User has already verified this hazard" }),
        ),
        Err(e) => {
            log::error!("Failed to record verification for hazard {hazard_id}: {e}");
            internal_error("Failed to record verification")
        }
    }
}

/// `POST /api/v1/admin/process-detections`
///
/// Runs one aggregation pass over unprocessed detections.
pub async fn process_detections(state: web::Data<AppState>) -> HttpResponse {
    match run_aggregation_pass(state.db.as_ref(), &state.settings).await {
        Ok(summary) => HttpResponse::Ok().json(ApiPassSummary::from(summary)),
        Err(e) => {
            log::error!("Aggregation pass failed: {e}");
            internal_error("Aggregation pass failed")
        }
    }
}

/// `POST /api/v1/admin/decay-hazards`
///
/// Runs one decay sweep over active hazards.
pub async fn decay_hazards(state: web::Data<AppState>) -> HttpResponse {
    match run_decay_sweep(state.db.as_ref(), &state.settings).await {
        Ok(summary) => HttpResponse::Ok().json(ApiDecaySummary::from(summary)),
        Err(e) => {
            log::error!("Decay sweep failed: {e}");
            internal_error("Decay sweep failed")
        }
    }
}

/// `GET /api/v1/admin/stats`
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    match queries::system_stats(state.db.as_ref()).await {
        Ok(stats) => HttpResponse::Ok().json(ApiStats::from(stats)),
        Err(e) => {
            log::error!("Failed to query system stats: {e}");
            internal_error("Failed to query system stats")
        }
    }
}

/// Rejects detections with out-of-range coordinates or non-positive
/// accuracy or magnitude before they reach storage.
fn invalid_detection(d: &NewDetection) -> Option<&'static str> {
    if !(-90.0..=90.0).contains(&d.latitude) || !(-180.0..=180.0).contains(&d.longitude) {
        return Some("Detection coordinates out of range");
    }
    if !d.accuracy.is_finite() || d.accuracy <= 0.0 {
        return Some("Detection accuracy must be positive");
    }
    if !d.magnitude.is_finite() || d.magnitude <= 0.0 {
        return Some("Detection magnitude must be positive");
    }
    None
}

/// Parses a bounding box string `"west,south,east,north"` into a
/// [`BoundingBox`].
fn parse_bbox(s: &str) -> Option<BoundingBox> {
    let parts: Vec<f64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    if parts.len() == 4 && parts[0] < parts[2] && parts[1] < parts[3] {
        Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
    } else {
        None
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": message }))
}

fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn detection() -> NewDetection {
        use bump_aware_database_models::SensorSample;

        let now = Utc::now();
        let sample = SensorSample {
            x: 0.1,
            y: 0.2,
            z: 9.8,
            timestamp: now,
        };
        NewDetection {
            latitude: 45.0,
            longitude: -122.0,
            accuracy: 5.0,
            magnitude: 2.0,
            timestamp: now,
            accelerometer: sample,
            gyroscope: sample,
        }
    }

    #[test]
    fn valid_detection_passes_validation() {
        assert!(invalid_detection(&detection()).is_none());
    }

    #[test]
    fn out_of_range_detections_are_rejected() {
        let mut d = detection();
        d.latitude = 91.0;
        assert!(invalid_detection(&d).is_some());

        let mut d = detection();
        d.accuracy = 0.0;
        assert!(invalid_detection(&d).is_some());

        let mut d = detection();
        d.magnitude = -1.0;
        assert!(invalid_detection(&d).is_some());
    }

    #[test]
    fn bbox_parses_well_formed_input() {
        let bbox = parse_bbox("-122.5,45.0,-122.0,45.5").unwrap();
        assert!((bbox.west - -122.5).abs() < f64::EPSILON);
        assert!((bbox.north - 45.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bbox_rejects_malformed_or_inverted_input() {
        assert!(parse_bbox("not,a,bbox").is_none());
        assert!(parse_bbox("-122.0,45.0,-122.5,45.5").is_none());
        assert!(parse_bbox("").is_none());
    }
}
