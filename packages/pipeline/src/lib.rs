#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The detection-to-hazard aggregation pipeline.
//!
//! One pass consumes every unprocessed detection (batch-limited), clusters
//! the whole set, filters outliers per cluster, scores each surviving
//! cluster into a new hazard, and persists everything inside a single
//! transaction. A failed pass rolls back completely: no detection is ever
//! left marked processed without its hazard link (or deliberate lack of
//! one) committed alongside it.
//!
//! The decay sweep is the companion maintenance operation: it recomputes
//! ongoing confidence for every active hazard and deactivates the ones
//! that have gone quiet and stale.

use std::collections::{BTreeMap, BTreeSet};

use bump_aware_config::Settings;
use bump_aware_database::{DbError, queries};
use bump_aware_database_models::{DetectionRow, NewHazard};
use bump_aware_engine::{
    ClusterPoint, EmptyClusterError, HazardObservations, centroid, classify, cluster,
    creation_confidence, is_outlier, ongoing_confidence, severity, should_deactivate,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use switchy_database::Database;

/// Errors from a pipeline pass or decay sweep.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Storage failure; the in-flight pass has been rolled back and may be
    /// retried wholesale.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    /// A cluster with no scoreable members reached the scorer. Indicates
    /// a bug in the admission logic, not a data problem.
    #[error(transparent)]
    EmptyCluster(#[from] EmptyClusterError),
}

/// Counters describing one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Unprocessed detections fetched.
    pub detections_total: usize,
    /// Detections clustered, admitted, and linked to a hazard.
    pub detections_processed: usize,
    /// Detections marked processed with no hazard link (noise plus
    /// rejected outliers).
    pub noise_count: usize,
    /// New hazard rows created.
    pub hazards_created: usize,
    /// Clusters found by the density scan.
    pub clusters_found: usize,
}

/// Counters describing one decay sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecaySummary {
    /// Active hazards examined.
    pub examined: usize,
    /// Hazards flipped inactive.
    pub deactivated: usize,
}

/// What the outlier filter decided for one cluster's members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Admission {
    admitted: Vec<i64>,
    rejected: Vec<i64>,
}

/// Runs one aggregation pass over the unprocessed detection backlog.
///
/// The whole pass runs inside one scoped transaction from
/// [`Database::begin_transaction`], so concurrent passes each get their
/// own transaction and `FOR UPDATE SKIP LOCKED` keeps their claimed rows
/// disjoint. Re-running with nothing unprocessed is a safe no-op;
/// already-processed detections are never revisited. Each cluster becomes
/// a fresh hazard — this version never attaches detections to a
/// pre-existing hazard.
///
/// # Errors
///
/// Returns [`PipelineError`] if storage fails; the whole pass is rolled
/// back first.
pub async fn run_aggregation_pass(
    db: &dyn Database,
    settings: &Settings,
) -> Result<PassSummary, PipelineError> {
    let txn = db.begin_transaction().await.map_err(DbError::from)?;

    match aggregate_batch(txn.as_ref(), settings).await {
        Ok(summary) => {
            txn.commit().await.map_err(DbError::from)?;
            log::info!(
                "Aggregation pass: {} fetched, {} linked into {} hazards ({} clusters), {} noise",
                summary.detections_total,
                summary.detections_processed,
                summary.hazards_created,
                summary.clusters_found,
                summary.noise_count
            );
            Ok(summary)
        }
        Err(e) => {
            log::error!("Aggregation pass failed, rolling back: {e}");
            if let Err(rollback_err) = txn.rollback().await {
                log::error!("Failed to roll back aggregation pass: {rollback_err}");
            }
            Err(e)
        }
    }
}

async fn aggregate_batch(
    db: &dyn Database,
    settings: &Settings,
) -> Result<PassSummary, PipelineError> {
    let detections =
        queries::fetch_unprocessed_detections(db, settings.aggregation_batch_limit).await?;

    if detections.is_empty() {
        log::debug!("No unprocessed detections; aggregation pass is a no-op");
        return Ok(PassSummary::default());
    }

    let points: Vec<ClusterPoint> = detections
        .iter()
        .map(|d| ClusterPoint {
            id: d.id,
            latitude: d.latitude,
            longitude: d.longitude,
        })
        .collect();

    let clusters = cluster(
        &points,
        settings.spatial_cluster_radius_meters,
        settings.min_detections_for_hazard,
    );

    let by_id: BTreeMap<i64, &DetectionRow> = detections.iter().map(|d| (d.id, d)).collect();

    let mut summary = PassSummary {
        detections_total: detections.len(),
        clusters_found: clusters.len(),
        ..PassSummary::default()
    };
    let mut linked_ids: BTreeSet<i64> = BTreeSet::new();

    for member_ids in &clusters {
        let members: Vec<&DetectionRow> = member_ids
            .iter()
            .filter_map(|id| by_id.get(id).copied())
            .collect();

        let admission = filter_cluster_members(&members, settings.max_gps_accuracy_meters);
        if !admission.rejected.is_empty() {
            log::debug!(
                "Rejected {} outlier detections from cluster of {}",
                admission.rejected.len(),
                members.len()
            );
        }

        if admission.admitted.is_empty() {
            // Every member failed the quality gates; the whole cluster
            // degrades to noise.
            continue;
        }

        let admitted_rows: Vec<&DetectionRow> = admission
            .admitted
            .iter()
            .filter_map(|id| by_id.get(id).copied())
            .collect();

        let hazard = score_cluster(&admitted_rows)?;
        let hazard_id = queries::insert_hazard(db, &hazard).await?;
        queries::link_detections(db, &admission.admitted, hazard_id).await?;

        linked_ids.extend(admission.admitted.iter().copied());
        summary.hazards_created += 1;
        summary.detections_processed += admission.admitted.len();
    }

    // Everything fetched but not linked — cluster rejects and points no
    // cluster wanted — is noise: processed, never linked.
    let noise_ids: Vec<i64> = detections
        .iter()
        .map(|d| d.id)
        .filter(|id| !linked_ids.contains(id))
        .collect();
    queries::mark_noise(db, &noise_ids).await?;
    summary.noise_count = noise_ids.len();

    Ok(summary)
}

/// Walks a cluster's members in id order, admitting each through the
/// outlier filter against the magnitudes already admitted.
///
/// The statistical gate only engages once three magnitudes are committed,
/// so early members are judged on GPS accuracy alone.
fn filter_cluster_members(members: &[&DetectionRow], max_gps_accuracy_meters: f64) -> Admission {
    let mut admission = Admission::default();
    let mut admitted_magnitudes: Vec<f64> = Vec::with_capacity(members.len());

    for member in members {
        if is_outlier(
            member.magnitude,
            member.accuracy,
            &admitted_magnitudes,
            max_gps_accuracy_meters,
        ) {
            admission.rejected.push(member.id);
        } else {
            admitted_magnitudes.push(member.magnitude);
            admission.admitted.push(member.id);
        }
    }

    admission
}

/// Derives a new hazard's fields from a cluster's admitted members.
fn score_cluster(members: &[&DetectionRow]) -> Result<NewHazard, EmptyClusterError> {
    let coords: Vec<(f64, f64)> = members.iter().map(|d| (d.latitude, d.longitude)).collect();
    let (latitude, longitude) = centroid(&coords)?;

    let magnitudes: Vec<f64> = members.iter().map(|d| d.magnitude).collect();

    let unique_users: BTreeSet<i64> = members.iter().map(|d| d.user_id).collect();

    let first_detected = members.iter().map(|d| d.timestamp).min().unwrap_or_default();
    let last_detected = members.iter().map(|d| d.timestamp).max().unwrap_or_default();

    Ok(NewHazard {
        latitude,
        longitude,
        hazard_type: classify(&magnitudes),
        severity: severity(&magnitudes),
        confidence: creation_confidence(members.len() as u64, unique_users.len() as u64),
        detection_count: i32::try_from(members.len()).unwrap_or(i32::MAX),
        unique_user_count: i32::try_from(unique_users.len()).unwrap_or(i32::MAX),
        first_detected,
        last_detected,
    })
}

/// Recomputes ongoing confidence for every active hazard and deactivates
/// the stale, low-confidence ones. Flips `is_active` only — hazard rows
/// are never deleted.
///
/// # Errors
///
/// Returns [`PipelineError`] if storage fails.
pub async fn run_decay_sweep(
    db: &dyn Database,
    settings: &Settings,
) -> Result<DecaySummary, PipelineError> {
    let hazards = queries::active_hazards(db).await?;
    let now = Utc::now();

    let mut summary = DecaySummary {
        examined: hazards.len(),
        deactivated: 0,
    };

    for hazard in &hazards {
        let days_since_last = (now - hazard.last_detected).num_days();
        let tally = queries::verification_tally(db, hazard.id).await?;

        #[allow(clippy::cast_sign_loss)]
        let confidence = ongoing_confidence(&HazardObservations {
            detection_count: hazard.detection_count.max(0) as u64,
            unique_user_count: hazard.unique_user_count.max(0) as u64,
            days_since_last_detection: days_since_last,
            positive_verifications: tally.positive,
            total_verifications: tally.total,
        });

        if should_deactivate(days_since_last, confidence, settings.confidence_decay_days) {
            log::info!(
                "Deactivating hazard {} (last detected {days_since_last} days ago, \
                 ongoing confidence {confidence})",
                hazard.id
            );
            queries::deactivate_hazard(db, hazard.id).await?;
            summary.deactivated += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn detection(id: i64, user_id: i64, magnitude: f64, accuracy: f64) -> DetectionRow {
        DetectionRow {
            id,
            user_id,
            latitude: 45.0 + f64::from(u32::try_from(id).unwrap()) * 1e-5,
            longitude: -122.0,
            accuracy,
            magnitude,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + chrono::Duration::minutes(id),
        }
    }

    #[test]
    fn deviant_magnitude_is_rejected_during_admission() {
        // Reference scenario: magnitudes [1.0, 1.2, 0.9, 1.1, 5.0], all
        // with good accuracy. The 5.0 g member is a z-score outlier
        // against the four already-committed magnitudes.
        let rows = [
            detection(1, 10, 1.0, 5.0),
            detection(2, 10, 1.2, 5.0),
            detection(3, 11, 0.9, 5.0),
            detection(4, 12, 1.1, 5.0),
            detection(5, 13, 5.0, 5.0),
        ];
        let members: Vec<&DetectionRow> = rows.iter().collect();

        let admission = filter_cluster_members(&members, 10.0);
        assert_eq!(admission.admitted, vec![1, 2, 3, 4]);
        assert_eq!(admission.rejected, vec![5]);

        let admitted: Vec<&DetectionRow> = rows[..4].iter().collect();
        let hazard = score_cluster(&admitted).unwrap();
        assert!((hazard.severity - 2.19).abs() < 1e-9, "got {}", hazard.severity);
        assert_eq!(hazard.detection_count, 4);
        assert_eq!(hazard.unique_user_count, 3);
    }

    #[test]
    fn poor_accuracy_member_is_rejected_before_statistics() {
        let rows = [
            detection(1, 10, 1.0, 5.0),
            detection(2, 10, 1.1, 50.0),
            detection(3, 11, 0.9, 5.0),
        ];
        let members: Vec<&DetectionRow> = rows.iter().collect();

        let admission = filter_cluster_members(&members, 10.0);
        assert_eq!(admission.admitted, vec![1, 3]);
        assert_eq!(admission.rejected, vec![2]);
    }

    #[test]
    fn cluster_of_only_bad_members_admits_nothing() {
        let rows = [
            detection(1, 10, 1.0, 99.0),
            detection(2, 10, 1.1, 99.0),
            detection(3, 11, 0.9, 99.0),
        ];
        let members: Vec<&DetectionRow> = rows.iter().collect();

        let admission = filter_cluster_members(&members, 10.0);
        assert!(admission.admitted.is_empty());
        assert_eq!(admission.rejected, vec![1, 2, 3]);
    }

    #[test]
    fn score_cluster_tracks_temporal_bounds_and_users() {
        let rows = [
            detection(1, 10, 1.0, 5.0),
            detection(2, 20, 1.2, 5.0),
            detection(3, 10, 0.9, 5.0),
        ];
        let members: Vec<&DetectionRow> = rows.iter().collect();

        let hazard = score_cluster(&members).unwrap();
        assert_eq!(hazard.unique_user_count, 2);
        assert_eq!(hazard.first_detected, rows[0].timestamp);
        assert_eq!(hazard.last_detected, rows[2].timestamp);
        assert!((hazard.latitude - 45.000_02).abs() < 1e-9);
        // 3 detections from 2 users: 0.3 + 0.4
        assert!((hazard.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_cluster_scoring_is_an_error() {
        assert!(score_cluster(&[]).is_err());
    }
}
