//! Per-tick adjacency evaluation.
//!
//! For one tick the evaluator queries the position oracle once per node,
//! then classifies every unordered pair as connected when both the
//! spherical-Earth line-of-sight test and the PHY range test pass. The
//! relation is symmetric; routing addresses it through ascending-index
//! neighbour iteration for deterministic tie-breaking.

use crate::error::SimError;
use crate::geometry::{Vec3, distance2_km, has_line_of_sight};
use crate::model::node::{NodeSet, PositionOracle};

/// Snapshot of geometry at a single tick: node positions plus the
/// symmetric connectivity matrix.
pub struct TickGeometry {
    n: usize,
    positions: Vec<Vec3>,
    connected: Vec<bool>,
}

impl TickGeometry {
    /// Evaluate positions and connectivity at time `t`.
    ///
    /// Any oracle failure aborts the run; the caller surfaces it as a
    /// configuration-class error.
    pub fn evaluate(
        oracle: &dyn PositionOracle,
        nodes: &NodeSet,
        t: f64,
        max_range_km: f64,
        r_los_km: f64,
    ) -> Result<TickGeometry, SimError> {
        let n = nodes.len();
        let mut positions = Vec::with_capacity(n);
        for node in nodes.iter() {
            positions.push(oracle.xyz_km(&node.name, t)?);
        }

        let max_range2 = max_range_km * max_range_km;
        let mut connected = vec![false; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let in_range = distance2_km(&positions[i], &positions[j]) <= max_range2;
                if in_range && has_line_of_sight(&positions[i], &positions[j], r_los_km) {
                    connected[i * n + j] = true;
                    connected[j * n + i] = true;
                }
            }
        }

        Ok(TickGeometry {
            n,
            positions,
            connected,
        })
    }

    pub fn connected(&self, i: usize, j: usize) -> bool {
        self.connected[i * self.n + j]
    }

    /// Connected neighbours of `i` in ascending node-index order.
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n).filter(move |&j| self.connected(i, j))
    }

    /// Straight-line distances from every node to `target`, used by the
    /// greedy-towards-destination decider.
    pub fn distances_to(&self, target: usize) -> Vec<f64> {
        let dst = self.positions[target];
        self.positions
            .iter()
            .map(|p| crate::geometry::distance_km(p, &dst))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{FnOracle, NodeKind};

    fn ring_nodes(count: usize) -> NodeSet {
        let mut nodes = NodeSet::new();
        for i in 0..count {
            nodes.add(&format!("SAT-{}", i + 1), NodeKind::Satellite).unwrap();
        }
        nodes
    }

    /// Evenly spaced satellites on a 7000 km equatorial ring.
    fn ring_oracle(count: usize) -> impl PositionOracle {
        FnOracle(move |name: &str, _t: f64| {
            let idx: usize = name
                .strip_prefix("SAT-")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap()
                - 1;
            let ang = std::f64::consts::TAU * idx as f64 / count as f64;
            Ok(Vec3::new(7000.0 * ang.cos(), 7000.0 * ang.sin(), 0.0))
        })
    }

    #[test]
    fn ring_connectivity_is_nearest_neighbours_only() {
        // 12 satellites, 30° apart: neighbour chord ≈ 3623 km. A 4000 km
        // range reaches adjacent satellites; the 2-apart chord (7000 km)
        // is both out of range and Earth-blocked.
        let nodes = ring_nodes(12);
        let oracle = ring_oracle(12);
        let geom = TickGeometry::evaluate(&oracle, &nodes, 0.0, 4000.0, 6350.0).unwrap();

        assert!(geom.connected(0, 1));
        assert!(geom.connected(0, 11));
        assert!(!geom.connected(0, 2));
        assert!(!geom.connected(0, 6));
        assert_eq!(geom.neighbors(0).collect::<Vec<_>>(), vec![1, 11]);
    }

    #[test]
    fn range_pass_is_not_enough_without_los() {
        // Antipodal pair within a huge range budget: Earth still blocks.
        let mut nodes = NodeSet::new();
        nodes.add("A", NodeKind::Satellite).unwrap();
        nodes.add("B", NodeKind::Satellite).unwrap();
        let oracle = FnOracle(|name: &str, _| {
            Ok(match name {
                "A" => Vec3::new(7000.0, 0.0, 0.0),
                _ => Vec3::new(-7000.0, 0.0, 0.0),
            })
        });
        let geom = TickGeometry::evaluate(&oracle, &nodes, 0.0, 50_000.0, 6350.0).unwrap();
        assert!(!geom.connected(0, 1));
    }

    #[test]
    fn oracle_failure_aborts_evaluation() {
        let mut nodes = NodeSet::new();
        nodes.add("A", NodeKind::Satellite).unwrap();
        let oracle = FnOracle(|name: &str, t: f64| {
            Err(SimError::PositionOracle {
                node: name.to_string(),
                t,
                reason: "ephemeris gap".to_string(),
            })
        });
        assert!(TickGeometry::evaluate(&oracle, &nodes, 0.0, 1000.0, 6350.0).is_err());
    }

    #[test]
    fn distances_to_destination_are_euclidean() {
        let nodes = ring_nodes(4);
        let oracle = ring_oracle(4);
        let geom = TickGeometry::evaluate(&oracle, &nodes, 0.0, 1.0, 6350.0).unwrap();
        let dist = geom.distances_to(0);
        assert_eq!(dist[0], 0.0);
        assert!((dist[2] - 14_000.0).abs() < 1e-6);
    }
}
