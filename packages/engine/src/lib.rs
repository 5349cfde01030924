#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Pure detection-to-hazard computation: spatial clustering, outlier
//! rejection, and hazard scoring.
//!
//! Nothing in this crate touches storage. The aggregation pipeline feeds
//! it detection batches and persists what comes out; the alert ranker
//! reuses the scoring helpers. Keeping the math storage-free is what makes
//! the numeric contracts testable in isolation.

pub mod cluster;
pub mod outlier;
pub mod score;

mod stats;

pub use cluster::{ClusterPoint, cluster};
pub use outlier::is_outlier;
pub use score::{
    HazardObservations, centroid, classify, creation_confidence, ongoing_confidence, severity,
    should_deactivate, temporal_weight,
};

/// Error returned when a scoring operation is invoked on an empty cluster.
///
/// Cluster membership is decided before scoring, so an empty cluster
/// reaching the scorer is a caller bug, not a data condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot compute centroid of an empty cluster")]
pub struct EmptyClusterError;
