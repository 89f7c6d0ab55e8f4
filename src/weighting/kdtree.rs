/// Static 2D k-d tree over well coordinates.
///
/// Built once per point set and read-only afterwards. Supports the
/// k-nearest query used for nearest-neighbor declustering distances.
///
/// Reference:
/// Bentley, J.L. (1975). Multidimensional binary search trees used
/// for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use crate::model::{WeightingError, WellPoint};

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    /// Coordinates in input order; node and query results index into this.
    coords: Vec<[f64; 2]>,
}

#[derive(Debug)]
struct KdNode {
    point_idx: usize,
    /// 0 = x, 1 = y
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// One neighbor returned by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the neighbor in the slice the tree was built from.
    pub index: usize,
    pub distance_sq: f64,
}

impl Neighbor {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

impl KdTree {
    /// Builds the tree with median splits, O(n log n).
    ///
    /// Fails on the first point whose coordinates are not finite, since such
    /// a point cannot be ordered along either axis.
    pub fn build(points: &[WellPoint]) -> Result<Self, WeightingError> {
        let mut coords = Vec::with_capacity(points.len());
        for p in points {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(WeightingError::NonFiniteCoordinate { id: p.id.clone() });
            }
            coords.push([p.x, p.y]);
        }

        let mut nodes = Vec::with_capacity(coords.len());
        if !coords.is_empty() {
            let mut indices: Vec<usize> = (0..coords.len()).collect();
            build_recursive(&coords, &mut indices, 0, &mut nodes);
        }

        Ok(Self { nodes, coords })
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Up to `k` nearest indexed points to `(qx, qy)`, ascending by distance.
    ///
    /// A query from an indexed location returns that point itself first,
    /// at distance zero.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        // Kept sorted ascending; the last entry is the current k-th best.
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, [qx, qy], k, &mut best);
        best
    }

    fn knn_recursive(&self, node_idx: usize, q: [f64; 2], k: usize, best: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let p = self.coords[node.point_idx];

        let dx = q[0] - p[0];
        let dy = q[1] - p[1];
        let distance_sq = dx * dx + dy * dy;

        if best.len() < k || distance_sq < worst(best) {
            let pos = best.partition_point(|n| n.distance_sq <= distance_sq);
            best.insert(
                pos,
                Neighbor {
                    index: node.point_idx,
                    distance_sq,
                },
            );
            best.truncate(k);
        }

        let diff = if node.axis == 0 { dx } else { dy };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.knn_recursive(child, q, k, best);
        }

        // The far side can only hold closer points if the splitting line is
        // within the current k-th best distance.
        if best.len() < k || diff * diff <= worst(best) {
            if let Some(child) = far {
                self.knn_recursive(child, q, k, best);
            }
        }
    }
}

fn worst(best: &[Neighbor]) -> f64 {
    best.last().map_or(f64::INFINITY, |n| n.distance_sq)
}

fn build_recursive(
    coords: &[[f64; 2]],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let axis = depth % 2;
    indices.sort_unstable_by(|&a, &b| {
        coords[a][axis]
            .partial_cmp(&coords[b][axis])
            .unwrap_or(Ordering::Equal)
    });

    let median = indices.len() / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        axis,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        let child = build_recursive(coords, left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }
    if !right.is_empty() {
        let child = build_recursive(coords, right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }

    node_idx
}
