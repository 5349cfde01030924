//! Density-based spatial clustering of detections (DBSCAN semantics).
//!
//! Implemented as an explicit neighbor-graph construction over exact
//! haversine distance, with candidate neighbors located through an R-tree
//! envelope query. Cluster membership is a pure function of the input
//! point set: shuffling the input order yields the same clusters and the
//! same noise set.

use rstar::{AABB, RTree, RTreeObject};

use bump_aware_geo::{degrees_from_meters, distance_meters};

/// One detection as seen by the clustering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterPoint {
    /// Detection identifier carried through into the output clusters.
    pub id: i64,
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
}

/// A point stored in the R-tree with its index into the input slice.
struct IndexedPoint {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Groups points into density-based clusters of detection ids.
///
/// Two points are reachable when their haversine distance is at most
/// `eps_meters`. A point is a core point when it has at least `min_points`
/// reachable neighbors, itself included. Clusters are the connected
/// components of core points; a non-core point within reach of a core
/// point joins the cluster of its nearest core neighbor (ties broken by
/// lowest id). Points reachable from no core point are noise and appear
/// in no cluster.
///
/// Returns clusters with member ids sorted ascending, ordered by their
/// smallest member id. Fewer than `min_points` inputs short-circuits to
/// no clusters without computing any distances.
#[must_use]
pub fn cluster(points: &[ClusterPoint], eps_meters: f64, min_points: usize) -> Vec<Vec<i64>> {
    if points.len() < min_points {
        return Vec::new();
    }

    let neighbors = build_neighbor_lists(points, eps_meters);

    let core: Vec<bool> = neighbors.iter().map(|n| n.len() >= min_points).collect();

    // Connected components over core-core reachability.
    let mut component = DisjointSets::new(points.len());
    for (i, neigh) in neighbors.iter().enumerate() {
        if !core[i] {
            continue;
        }
        for &(j, _) in neigh {
            if core[j] {
                component.union(i, j);
            }
        }
    }

    let mut clusters: std::collections::BTreeMap<usize, Vec<i64>> =
        std::collections::BTreeMap::new();

    for i in 0..points.len() {
        if core[i] {
            clusters
                .entry(component.find(i))
                .or_default()
                .push(points[i].id);
        }
    }

    // Border points: nearest core neighbor wins, ties by lowest id.
    for (i, neigh) in neighbors.iter().enumerate() {
        if core[i] {
            continue;
        }
        let nearest_core = neigh
            .iter()
            .filter(|&&(j, _)| core[j])
            .min_by(|&&(a, da), &&(b, db)| {
                da.total_cmp(&db).then(points[a].id.cmp(&points[b].id))
            });
        if let Some(&(j, _)) = nearest_core {
            clusters
                .entry(component.find(j))
                .or_default()
                .push(points[i].id);
        }
    }

    let mut result: Vec<Vec<i64>> = clusters
        .into_values()
        .map(|mut ids| {
            ids.sort_unstable();
            ids
        })
        .collect();
    result.sort_unstable_by_key(|ids| ids[0]);

    log::debug!(
        "clustered {} points into {} clusters (eps {eps_meters}m, min {min_points})",
        points.len(),
        result.len()
    );

    result
}

/// Builds, for each point, the list of `(index, distance)` neighbors
/// within `eps_meters` (self included at distance zero).
///
/// The R-tree envelope query uses the loose degree approximation padded
/// for latitude; exact haversine confirms each candidate.
fn build_neighbor_lists(points: &[ClusterPoint], eps_meters: f64) -> Vec<Vec<(usize, f64)>> {
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                index,
                envelope: AABB::from_point([p.longitude, p.latitude]),
            })
            .collect(),
    );

    let lat_pad = degrees_from_meters(eps_meters);

    points
        .iter()
        .map(|p| {
            // Longitude degrees shrink with latitude; clamp the cosine so
            // near-polar points still get a finite (oversized) envelope.
            let lon_pad = lat_pad / p.latitude.to_radians().cos().abs().max(0.01);
            let query = AABB::from_corners(
                [p.longitude - lon_pad, p.latitude - lat_pad],
                [p.longitude + lon_pad, p.latitude + lat_pad],
            );

            let mut neigh: Vec<(usize, f64)> = tree
                .locate_in_envelope_intersecting(&query)
                .filter_map(|entry| {
                    let q = &points[entry.index];
                    let d = distance_meters(p.latitude, p.longitude, q.latitude, q.longitude);
                    (d <= eps_meters).then_some((entry.index, d))
                })
                .collect();
            neigh.sort_unstable_by_key(|&(idx, _)| idx);
            neigh
        })
        .collect()
}

/// Union-find with path compression, for core-point components.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Deterministic: smaller root index wins.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: i64, lat: f64, lon: f64) -> ClusterPoint {
        ClusterPoint {
            id,
            latitude: lat,
            longitude: lon,
        }
    }

    /// Offsets a base coordinate by roughly `meters` northward.
    fn north_of(lat: f64, meters: f64) -> f64 {
        lat + meters / 111_000.0
    }

    #[test]
    fn fewer_points_than_min_yields_no_clusters() {
        let points = vec![point(1, 45.0, -122.0), point(2, 45.0, -122.0)];
        assert!(cluster(&points, 15.0, 3).is_empty());
    }

    #[test]
    fn tight_group_forms_one_cluster() {
        let base = 45.0;
        let points: Vec<ClusterPoint> = (0u8..5)
            .map(|i| point(i64::from(i), north_of(base, f64::from(i) * 2.0), -122.0))
            .collect();
        let clusters = cluster(&points, 15.0, 3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0], vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn distant_point_is_noise() {
        let mut points: Vec<ClusterPoint> = (0u8..4)
            .map(|i| point(i64::from(i), north_of(45.0, f64::from(i) * 2.0), -122.0))
            .collect();
        // ~1 km away: reachable from nothing.
        points.push(point(99, north_of(45.0, 1000.0), -122.0));

        let clusters = cluster(&points, 15.0, 3);
        assert_eq!(clusters.len(), 1);
        assert!(!clusters[0].contains(&99));
    }

    #[test]
    fn two_separate_groups_form_two_clusters() {
        let mut points: Vec<ClusterPoint> = (0u8..3)
            .map(|i| point(i64::from(i), north_of(45.0, f64::from(i) * 3.0), -122.0))
            .collect();
        points.extend((0u8..3).map(|i| {
            point(
                i64::from(i) + 10,
                north_of(45.0, 2000.0 + f64::from(i) * 3.0),
                -122.0,
            )
        }));

        let clusters = cluster(&points, 15.0, 3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec![0, 1, 2]);
        assert_eq!(clusters[1], vec![10, 11, 12]);
    }

    #[test]
    fn membership_is_invariant_under_input_permutation() {
        let mut points: Vec<ClusterPoint> = (0u8..6)
            .map(|i| point(i64::from(i), north_of(45.0, f64::from(i) * 4.0), -122.0))
            .collect();
        points.push(point(50, north_of(45.0, 5000.0), -122.0));

        let baseline = cluster(&points, 20.0, 3);

        // A few deterministic permutations.
        for rotation in 1..points.len() {
            let mut shuffled = points.clone();
            shuffled.rotate_left(rotation);
            assert_eq!(cluster(&shuffled, 20.0, 3), baseline);
        }
        let mut reversed = points.clone();
        reversed.reverse();
        assert_eq!(cluster(&reversed, 20.0, 3), baseline);
    }

    #[test]
    fn chain_of_core_points_connects_into_one_cluster() {
        // Points every 10m; eps 15m, min 3: interior points are core and
        // chain the whole line together.
        let points: Vec<ClusterPoint> = (0u8..8)
            .map(|i| point(i64::from(i), north_of(45.0, f64::from(i) * 10.0), -122.0))
            .collect();
        let clusters = cluster(&points, 15.0, 3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 8);
    }
}
