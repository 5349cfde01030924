#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geometric primitives shared by the clustering engine and alert ranker.
//!
//! All per-pair distances in the system go through [`distance_meters`]
//! (exact haversine). [`degrees_from_meters`] is a deliberately loose
//! linear approximation used only to size search envelopes — never for
//! measuring distance between two points.

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Great-circle (haversine) distance between two WGS84 points, in meters.
///
/// Symmetric, zero for identical points, and finite for any input
/// including antipodal pairs.
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Converts a radius in meters to an approximate angular radius in degrees.
///
/// Linear equatorial approximation (1 degree ~ 111 km). Accurate near the
/// equator, increasingly loose toward the poles — callers must treat any
/// radius derived from this as approximate and confirm candidates with
/// [`distance_meters`].
#[must_use]
pub fn degrees_from_meters(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}
