//! Database query functions for detections, hazards, and verifications.
//!
//! Spatial queries use `query_raw_params()` with `PostGIS` functions.
//! Every function takes `&dyn Database`, so multi-statement callers (the
//! aggregation pipeline, verification recording) run them through a scoped
//! transaction handle from `Database::begin_transaction()` rather than the
//! shared connection.

use std::fmt::Write as _;

use bump_aware_database_models::{
    BoundingBox, DetectionRow, HazardRow, NearbyHazard, NewDetection, NewHazard, SystemStats,
    VerificationTally,
};
use bump_aware_hazard_models::HazardType;
use chrono::{DateTime, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Page size for the bounding-box map query.
const BOUNDS_PAGE_SIZE: i64 = 500;

/// Fetches unprocessed detections, oldest first, claiming the rows with
/// `FOR UPDATE SKIP LOCKED` so two concurrent aggregation passes can never
/// consume the same detections.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn fetch_unprocessed_detections(
    db: &dyn Database,
    limit: u32,
) -> Result<Vec<DetectionRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, user_id, latitude, longitude, accuracy, magnitude, timestamp
             FROM detections
             WHERE processed = FALSE
             ORDER BY id
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
            &[DatabaseValue::Int64(i64::from(limit))],
        )
        .await?;

    let mut detections = Vec::with_capacity(rows.len());
    for row in &rows {
        let timestamp_naive: NaiveDateTime = row.to_value("timestamp").unwrap_or_default();
        detections.push(DetectionRow {
            id: row.to_value("id").unwrap_or(0),
            user_id: row.to_value("user_id").unwrap_or(0),
            latitude: row.to_value("latitude").unwrap_or(0.0),
            longitude: row.to_value("longitude").unwrap_or(0.0),
            accuracy: row.to_value("accuracy").unwrap_or(0.0),
            magnitude: row.to_value("magnitude").unwrap_or(0.0),
            timestamp: to_utc(timestamp_naive),
        });
    }

    Ok(detections)
}

/// Inserts a batch of uploaded detections for one user, unprocessed.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn insert_detections(
    db: &dyn Database,
    user_id: i64,
    detections: &[NewDetection],
) -> Result<u64, DbError> {
    let mut inserted = 0u64;

    for d in detections {
        let result = db
            .exec_raw_params(
                "INSERT INTO detections (
                    user_id, location, latitude, longitude, accuracy,
                    magnitude, timestamp,
                    accelerometer_x, accelerometer_y, accelerometer_z,
                    accelerometer_timestamp,
                    gyroscope_x, gyroscope_y, gyroscope_z, gyroscope_timestamp,
                    processed
                ) VALUES (
                    $1,
                    ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                    $3, $2, $4, $5, $6,
                    $7, $8, $9, $10,
                    $11, $12, $13, $14,
                    FALSE
                )",
                &[
                    DatabaseValue::Int64(user_id),
                    DatabaseValue::Real64(d.longitude),
                    DatabaseValue::Real64(d.latitude),
                    DatabaseValue::Real64(d.accuracy),
                    DatabaseValue::Real64(d.magnitude),
                    DatabaseValue::DateTime(d.timestamp.naive_utc()),
                    DatabaseValue::Real64(d.accelerometer.x),
                    DatabaseValue::Real64(d.accelerometer.y),
                    DatabaseValue::Real64(d.accelerometer.z),
                    DatabaseValue::DateTime(d.accelerometer.timestamp.naive_utc()),
                    DatabaseValue::Real64(d.gyroscope.x),
                    DatabaseValue::Real64(d.gyroscope.y),
                    DatabaseValue::Real64(d.gyroscope.z),
                    DatabaseValue::DateTime(d.gyroscope.timestamp.naive_utc()),
                ],
            )
            .await?;

        inserted += result;
    }

    Ok(inserted)
}

/// Inserts a freshly formed hazard and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or no id comes
/// back.
pub async fn insert_hazard(db: &dyn Database, hazard: &NewHazard) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO hazards (
                location, latitude, longitude, hazard_type, severity,
                confidence, detection_count, unique_user_count,
                verification_count, positive_verifications,
                first_detected, last_detected, is_active, is_verified
            ) VALUES (
                ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                $2, $1, $3, $4, $5, $6, $7, 0, 0, $8, $9, TRUE, FALSE
            )
            RETURNING id",
            &[
                DatabaseValue::Real64(hazard.longitude),
                DatabaseValue::Real64(hazard.latitude),
                DatabaseValue::String(hazard.hazard_type.as_ref().to_string()),
                DatabaseValue::Real64(hazard.severity),
                DatabaseValue::Real64(hazard.confidence),
                DatabaseValue::Int32(hazard.detection_count),
                DatabaseValue::Int32(hazard.unique_user_count),
                DatabaseValue::DateTime(hazard.first_detected.naive_utc()),
                DatabaseValue::DateTime(hazard.last_detected.naive_utc()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get hazard id from insert".to_string(),
    })?;

    let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse hazard id: {e}"),
    })?;

    Ok(id)
}

/// Marks detections processed and links them to a hazard.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn link_detections(
    db: &dyn Database,
    detection_ids: &[i64],
    hazard_id: i64,
) -> Result<u64, DbError> {
    if detection_ids.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE detections SET processed = TRUE, hazard_id = $1 WHERE id IN ({})",
        id_list(detection_ids)
    );
    let updated = db
        .exec_raw_params(&sql, &[DatabaseValue::Int64(hazard_id)])
        .await?;

    Ok(updated)
}

/// Marks detections processed with no hazard link (noise and rejected
/// outliers).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn mark_noise(db: &dyn Database, detection_ids: &[i64]) -> Result<u64, DbError> {
    if detection_ids.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE detections SET processed = TRUE WHERE id IN ({})",
        id_list(detection_ids)
    );
    let updated = db.exec_raw_params(&sql, &[]).await?;

    Ok(updated)
}

/// Active hazards within `radius_meters` of a point, each annotated with
/// its distance, nearest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn nearby_active_hazards(
    db: &dyn Database,
    lat: f64,
    lon: f64,
    radius_meters: f64,
    min_confidence: f64,
    limit: u32,
) -> Result<Vec<NearbyHazard>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, latitude, longitude, hazard_type, severity, confidence,
                    ST_Distance(
                        location,
                        ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography
                    ) as distance
             FROM hazards
             WHERE is_active = TRUE
               AND confidence >= $3
               AND ST_DWithin(
                       location,
                       ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                       $4
                   )
             ORDER BY distance ASC
             LIMIT $5",
            &[
                DatabaseValue::Real64(lon),
                DatabaseValue::Real64(lat),
                DatabaseValue::Real64(min_confidence),
                DatabaseValue::Real64(radius_meters),
                DatabaseValue::Int64(i64::from(limit)),
            ],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| NearbyHazard {
            id: row.to_value("id").unwrap_or(0),
            latitude: row.to_value("latitude").unwrap_or(0.0),
            longitude: row.to_value("longitude").unwrap_or(0.0),
            hazard_type: parse_hazard_type(row.to_value("hazard_type").unwrap_or_default()),
            severity: row.to_value("severity").unwrap_or(0.0),
            confidence: row.to_value("confidence").unwrap_or(0.0),
            distance_meters: row.to_value("distance").unwrap_or(0.0),
        })
        .collect())
}

/// Active hazards within a bounding box, for map display.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn hazards_in_bounds(
    db: &dyn Database,
    bbox: &BoundingBox,
    min_confidence: f64,
) -> Result<Vec<HazardRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, latitude, longitude, hazard_type, severity, confidence,
                    detection_count, unique_user_count, verification_count,
                    positive_verifications, first_detected, last_detected,
                    is_active, is_verified
             FROM hazards
             WHERE is_active = TRUE
               AND confidence >= $1
               AND latitude BETWEEN $2 AND $3
               AND longitude BETWEEN $4 AND $5
             LIMIT $6",
            &[
                DatabaseValue::Real64(min_confidence),
                DatabaseValue::Real64(bbox.south),
                DatabaseValue::Real64(bbox.north),
                DatabaseValue::Real64(bbox.west),
                DatabaseValue::Real64(bbox.east),
                DatabaseValue::Int64(BOUNDS_PAGE_SIZE),
            ],
        )
        .await?;

    Ok(rows.iter().map(parse_hazard_row).collect())
}

/// Fetches one hazard by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_hazard(db: &dyn Database, hazard_id: i64) -> Result<Option<HazardRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, latitude, longitude, hazard_type, severity, confidence,
                    detection_count, unique_user_count, verification_count,
                    positive_verifications, first_detected, last_detected,
                    is_active, is_verified
             FROM hazards
             WHERE id = $1",
            &[DatabaseValue::Int64(hazard_id)],
        )
        .await?;

    Ok(rows.first().map(parse_hazard_row))
}

/// Records a user's confirm/dispute vote on a hazard and bumps the
/// hazard's verification counters, atomically — the vote row and the
/// counter update commit together or not at all.
///
/// # Errors
///
/// Returns [`DbError::DuplicateVerification`] if the user already voted on
/// this hazard, or [`DbError`] if a database operation fails.
pub async fn insert_verification(
    db: &dyn Database,
    hazard_id: i64,
    user_id: i64,
    is_valid: bool,
    comment: Option<&str>,
) -> Result<(), DbError> {
    let txn = db.begin_transaction().await?;

    let inserted = txn
        .exec_raw_params(
            "INSERT INTO hazard_verifications (hazard_id, user_id, is_valid, comment)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (hazard_id, user_id) DO NOTHING",
            &[
                DatabaseValue::Int64(hazard_id),
                DatabaseValue::Int64(user_id),
                DatabaseValue::Bool(is_valid),
                comment.map_or(DatabaseValue::Null, |c| DatabaseValue::String(c.to_string())),
            ],
        )
        .await?;

    if inserted == 0 {
        txn.rollback().await?;
        return Err(DbError::DuplicateVerification { hazard_id, user_id });
    }

    txn.exec_raw_params(
        "UPDATE hazards SET
            verification_count = verification_count + 1,
            positive_verifications = positive_verifications + CASE WHEN $2 THEN 1 ELSE 0 END
         WHERE id = $1",
        &[
            DatabaseValue::Int64(hazard_id),
            DatabaseValue::Bool(is_valid),
        ],
    )
    .await?;

    txn.commit().await?;

    Ok(())
}

/// Counts total and positive verifications for a hazard from the votes
/// themselves (not the denormalized counters).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn verification_tally(
    db: &dyn Database,
    hazard_id: i64,
) -> Result<VerificationTally, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) as total,
                    COUNT(*) FILTER (WHERE is_valid) as positive
             FROM hazard_verifications
             WHERE hazard_id = $1",
            &[DatabaseValue::Int64(hazard_id)],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(VerificationTally::default());
    };

    let total: i64 = row.to_value("total").unwrap_or(0);
    let positive: i64 = row.to_value("positive").unwrap_or(0);

    #[allow(clippy::cast_sign_loss)]
    Ok(VerificationTally {
        total: total as u64,
        positive: positive as u64,
    })
}

/// All currently active hazards, for the decay sweep.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn active_hazards(db: &dyn Database) -> Result<Vec<HazardRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, latitude, longitude, hazard_type, severity, confidence,
                    detection_count, unique_user_count, verification_count,
                    positive_verifications, first_detected, last_detected,
                    is_active, is_verified
             FROM hazards
             WHERE is_active = TRUE
             ORDER BY id",
            &[],
        )
        .await?;

    Ok(rows.iter().map(parse_hazard_row).collect())
}

/// Flips a hazard inactive. Never deletes.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn deactivate_hazard(db: &dyn Database, hazard_id: i64) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE hazards SET is_active = FALSE WHERE id = $1",
        &[DatabaseValue::Int64(hazard_id)],
    )
    .await?;

    Ok(())
}

/// Detection and hazard counters for the admin stats endpoint.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn system_stats(db: &dyn Database) -> Result<SystemStats, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT
                (SELECT COUNT(*) FROM detections) as total_detections,
                (SELECT COUNT(*) FROM detections WHERE processed = TRUE) as processed_detections,
                (SELECT COUNT(*) FROM hazards) as total_hazards,
                (SELECT COUNT(*) FROM hazards WHERE is_active = TRUE) as active_hazards",
            &[],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(SystemStats::default());
    };

    Ok(SystemStats {
        total_detections: row.to_value("total_detections").unwrap_or(0),
        processed_detections: row.to_value("processed_detections").unwrap_or(0),
        total_hazards: row.to_value("total_hazards").unwrap_or(0),
        active_hazards: row.to_value("active_hazards").unwrap_or(0),
    })
}

/// Renders ids as a comma-separated list for an `IN (...)` clause. The
/// ids come from our own primary keys, never from user input.
fn id_list(ids: &[i64]) -> String {
    let mut list = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            list.push(',');
        }
        write!(list, "{id}").unwrap();
    }
    list
}

fn parse_hazard_type(name: String) -> HazardType {
    name.parse().unwrap_or(HazardType::Unknown)
}

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

fn parse_hazard_row(row: &switchy_database::Row) -> HazardRow {
    let first_naive: NaiveDateTime = row.to_value("first_detected").unwrap_or_default();
    let last_naive: NaiveDateTime = row.to_value("last_detected").unwrap_or_default();

    HazardRow {
        id: row.to_value("id").unwrap_or(0),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        longitude: row.to_value("longitude").unwrap_or(0.0),
        hazard_type: parse_hazard_type(row.to_value("hazard_type").unwrap_or_default()),
        severity: row.to_value("severity").unwrap_or(0.0),
        confidence: row.to_value("confidence").unwrap_or(0.0),
        detection_count: row.to_value("detection_count").unwrap_or(0),
        unique_user_count: row.to_value("unique_user_count").unwrap_or(0),
        verification_count: row.to_value("verification_count").unwrap_or(0),
        positive_verifications: row.to_value("positive_verifications").unwrap_or(0),
        first_detected: to_utc(first_naive),
        last_detected: to_utc(last_naive),
        is_active: row.to_value("is_active").unwrap_or(false),
        is_verified: row.to_value("is_verified").unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_renders_comma_separated() {
        assert_eq!(id_list(&[1, 2, 30]), "1,2,30");
        assert_eq!(id_list(&[7]), "7");
        assert_eq!(id_list(&[]), "");
    }

    #[test]
    fn unrecognized_hazard_type_falls_back_to_unknown() {
        assert_eq!(parse_hazard_type("sinkhole".to_string()), HazardType::Unknown);
        assert_eq!(parse_hazard_type("pothole".to_string()), HazardType::Pothole);
    }
}
