/// Nearest-neighbor distances for declustering.

use std::collections::HashMap;

use super::kdtree::KdTree;
use crate::model::{WeightingError, WellPoint};

/// Distance assigned to a point that has no other point to measure against.
pub const DEFAULT_ISOLATION_SENTINEL: f64 = 1e6;

/// Distance from each point to its closest other point, in input order.
///
/// Plain Euclidean distance over the coordinates as given. Each point queries
/// its two nearest indexed neighbors; the first is the point itself, so the
/// second is the nearest distinct neighbor. Points sharing coordinates get 0.
/// A single-point set gets `sentinel`.
pub fn nearest_neighbor_distances(
    points: &[WellPoint],
    sentinel: f64,
) -> Result<Vec<f64>, WeightingError> {
    let tree = KdTree::build(points)?;

    Ok(points
        .iter()
        .map(|p| {
            tree.k_nearest(p.x, p.y, 2)
                .get(1)
                .map_or(sentinel, |n| n.distance())
        })
        .collect())
}

/// Same as `nearest_neighbor_distances`, keyed by point id.
pub fn nearest_neighbor_map(
    points: &[WellPoint],
    sentinel: f64,
) -> Result<HashMap<String, f64>, WeightingError> {
    let distances = nearest_neighbor_distances(points, sentinel)?;
    Ok(points
        .iter()
        .map(|p| p.id.clone())
        .zip(distances)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(xs: &[f64]) -> Vec<WellPoint> {
        xs.iter()
            .enumerate()
            .map(|(i, &x)| WellPoint::new(format!("w{}", i), x, 0.0, 1))
            .collect()
    }

    #[test]
    fn test_three_points_on_a_line() {
        let d = nearest_neighbor_distances(&line(&[0.0, 1.0, 10.0]), DEFAULT_ISOLATION_SENTINEL)
            .unwrap();
        assert_eq!(d, vec![1.0, 1.0, 9.0]);
    }

    #[test]
    fn test_single_point_gets_sentinel() {
        let d = nearest_neighbor_distances(&line(&[5.0]), DEFAULT_ISOLATION_SENTINEL).unwrap();
        assert_eq!(d, vec![DEFAULT_ISOLATION_SENTINEL]);
    }

    #[test]
    fn test_custom_sentinel() {
        let d = nearest_neighbor_distances(&line(&[5.0]), 42.0).unwrap();
        assert_eq!(d, vec![42.0]);
    }

    #[test]
    fn test_zero_only_for_shared_coordinates() {
        let points = vec![
            WellPoint::new("a", 2.0, 2.0, 1),
            WellPoint::new("b", 2.0, 2.0, 1),
            WellPoint::new("c", 2.0, 2.5, 1),
            WellPoint::new("d", 7.0, -1.0, 1),
        ];
        let d = nearest_neighbor_map(&points, DEFAULT_ISOLATION_SENTINEL).unwrap();
        assert_eq!(d["a"], 0.0);
        assert_eq!(d["b"], 0.0);
        assert!((d["c"] - 0.5).abs() < 1e-12);
        assert!(d["d"] > 0.0);
    }

    #[test]
    fn test_diagonal_distance_is_euclidean() {
        let points = vec![WellPoint::new("a", 0.0, 0.0, 1), WellPoint::new("b", 3.0, 4.0, 1)];
        let d = nearest_neighbor_distances(&points, DEFAULT_ISOLATION_SENTINEL).unwrap();
        assert_eq!(d, vec![5.0, 5.0]);
    }
}
