//! Nodes and the position oracle seam.
//!
//! A node is identified by its unique, non-empty name; engines address
//! nodes by dense index into the [`NodeSet`] for O(1) adjacency rows and
//! deterministic tie-breaking. Positions come from a [`PositionOracle`]:
//! ground stations are a one-time geodetic→ECEF transform, satellites are
//! produced by whatever propagator backs the oracle. A simple circular
//! orbit propagator ships with the crate so scenario files are
//! self-contained; external propagators plug in through [`FnOracle`].

use std::collections::HashMap;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::geometry::{Vec3, geodetic_to_ecef_km};

/// Standard gravitational parameter of Earth, km³/s².
const MU_EARTH: f64 = 398_600.4418;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Satellite,
    GroundStation,
}

/// A participant in the network. Identity is by name.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

/// Dense, name-indexed collection of nodes.
///
/// Index order is the canonical node order used for routing tie-breaks,
/// so it must be stable for a given scenario (insertion order of the
/// scenario file).
#[derive(Debug, Default)]
pub struct NodeSet {
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, enforcing unique non-empty names.
    pub fn add(&mut self, name: &str, kind: NodeKind) -> Result<usize, SimError> {
        if name.is_empty() {
            return Err(SimError::config("node name must be non-empty"));
        }
        if self.by_name.contains_key(name) {
            return Err(SimError::config(format!("duplicate node name '{name}'")));
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
        });
        self.by_name.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolve a name or fail with an unknown-node diagnostic naming the
    /// referencing role.
    pub fn resolve(&self, name: &str, role: &str) -> Result<usize, SimError> {
        self.index_of(name).ok_or_else(|| SimError::UnknownNode {
            name: name.to_string(),
            role: role.to_string(),
        })
    }

    pub fn name(&self, index: usize) -> &str {
        &self.nodes[index].name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

/// Position source consumed by the engines.
///
/// Must be pure for a given `(node, t)`: the adjacency evaluator assumes
/// repeated queries within a tick agree.
pub trait PositionOracle {
    fn xyz_km(&self, node: &str, t: f64) -> Result<Vec3, SimError>;
}

/// Circular-orbit parameters for the built-in propagator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircularOrbit {
    /// Orbit radius from the Earth centre, km (not altitude).
    pub radius_km: f64,
    pub inclination_deg: f64,
    /// Right ascension of the ascending node, degrees.
    #[serde(default)]
    pub raan_deg: f64,
    /// Phase along the orbit at t = epoch, degrees.
    #[serde(default)]
    pub phase_deg: f64,
    /// Epoch the phase refers to, epoch seconds. Runs normally set this
    /// to the simulation start.
    #[serde(default)]
    pub epoch: f64,
}

impl CircularOrbit {
    /// Orbital period from the vis-viva relation, seconds.
    pub fn period_s(&self) -> f64 {
        TAU * (self.radius_km.powi(3) / MU_EARTH).sqrt()
    }

    /// Position at time `t`, epoch seconds.
    ///
    /// The in-plane circle is rotated by inclination about the x axis and
    /// then by RAAN about the z axis. Good enough for connectivity
    /// studies; no J2, no eccentricity.
    pub fn position_at(&self, t: f64) -> Vec3 {
        let anomaly = self.phase_deg.to_radians() + TAU * (t - self.epoch) / self.period_s();
        let (sin_u, cos_u) = anomaly.sin_cos();
        let (sin_i, cos_i) = self.inclination_deg.to_radians().sin_cos();
        let (sin_o, cos_o) = self.raan_deg.to_radians().sin_cos();

        let xp = self.radius_km * cos_u;
        let yp = self.radius_km * sin_u;

        Vec3::new(
            xp * cos_o - yp * cos_i * sin_o,
            xp * sin_o + yp * cos_i * cos_o,
            yp * sin_i,
        )
    }
}

#[derive(Debug)]
enum PositionSource {
    Fixed(Vec3),
    Orbit(CircularOrbit),
}

/// Oracle backed by per-node sources built from a scenario file.
///
/// Ground stations are converted to ECEF once at construction; satellite
/// positions are propagated on demand. An unknown node name is an oracle
/// failure and aborts the run.
#[derive(Debug, Default)]
pub struct ScenarioOracle {
    sources: HashMap<String, PositionSource>,
}

impl ScenarioOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ground_station(&mut self, name: &str, lat_deg: f64, lon_deg: f64, alt_km: f64) {
        let ecef = geodetic_to_ecef_km(lat_deg, lon_deg, alt_km);
        self.sources
            .insert(name.to_string(), PositionSource::Fixed(ecef));
    }

    pub fn add_satellite(&mut self, name: &str, orbit: CircularOrbit) {
        self.sources
            .insert(name.to_string(), PositionSource::Orbit(orbit));
    }
}

impl PositionOracle for ScenarioOracle {
    fn xyz_km(&self, node: &str, t: f64) -> Result<Vec3, SimError> {
        match self.sources.get(node) {
            Some(PositionSource::Fixed(p)) => Ok(*p),
            Some(PositionSource::Orbit(orbit)) => Ok(orbit.position_at(t)),
            None => Err(SimError::PositionOracle {
                node: node.to_string(),
                t,
                reason: "no position source registered".to_string(),
            }),
        }
    }
}

/// Closure-backed oracle for tests and external propagators.
#[allow(dead_code)]
pub struct FnOracle<F>(pub F)
where
    F: Fn(&str, f64) -> Result<Vec3, SimError>;

impl<F> PositionOracle for FnOracle<F>
where
    F: Fn(&str, f64) -> Result<Vec3, SimError>,
{
    fn xyz_km(&self, node: &str, t: f64) -> Result<Vec3, SimError> {
        (self.0)(node, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_set_enforces_unique_nonempty_names() {
        let mut nodes = NodeSet::new();
        assert_eq!(nodes.add("GS-1", NodeKind::GroundStation).unwrap(), 0);
        assert_eq!(nodes.add("SAT-1", NodeKind::Satellite).unwrap(), 1);
        assert!(nodes.add("GS-1", NodeKind::GroundStation).is_err());
        assert!(nodes.add("", NodeKind::Satellite).is_err());
        assert_eq!(nodes.index_of("SAT-1"), Some(1));
        assert!(matches!(
            nodes.resolve("SAT-9", "bundle source"),
            Err(SimError::UnknownNode { .. })
        ));
    }

    #[test]
    fn circular_orbit_period_matches_leo_expectation() {
        // 6878 km radius (~500 km altitude) orbits in roughly 94.6 min.
        let orbit = CircularOrbit {
            radius_km: 6878.0,
            inclination_deg: 0.0,
            raan_deg: 0.0,
            phase_deg: 0.0,
            epoch: 0.0,
        };
        let period_min = orbit.period_s() / 60.0;
        assert!((period_min - 94.6).abs() < 0.5, "got {period_min}");
    }

    #[test]
    fn circular_orbit_stays_on_its_sphere_and_advances() {
        let orbit = CircularOrbit {
            radius_km: 7000.0,
            inclination_deg: 51.6,
            raan_deg: 40.0,
            phase_deg: 10.0,
            epoch: 0.0,
        };
        let p0 = orbit.position_at(0.0);
        let p1 = orbit.position_at(orbit.period_s() / 4.0);
        assert!((p0.norm() - 7000.0).abs() < 1e-6);
        assert!((p1.norm() - 7000.0).abs() < 1e-6);
        assert!(crate::geometry::distance_km(&p0, &p1) > 1000.0);
        // Full period closes the loop.
        let p_full = orbit.position_at(orbit.period_s());
        assert!(crate::geometry::distance_km(&p0, &p_full) < 1e-6);
    }

    #[test]
    fn scenario_oracle_serves_fixed_and_orbiting_nodes() {
        let mut oracle = ScenarioOracle::new();
        oracle.add_ground_station("GS-1", 0.0, 0.0, 0.0);
        oracle.add_satellite(
            "SAT-1",
            CircularOrbit {
                radius_km: 7000.0,
                inclination_deg: 0.0,
                raan_deg: 0.0,
                phase_deg: 0.0,
                epoch: 0.0,
            },
        );

        let gs0 = oracle.xyz_km("GS-1", 0.0).unwrap();
        let gs1 = oracle.xyz_km("GS-1", 3600.0).unwrap();
        assert_eq!(gs0, gs1);

        let sat = oracle.xyz_km("SAT-1", 0.0).unwrap();
        assert!((sat.norm() - 7000.0).abs() < 1e-6);

        assert!(matches!(
            oracle.xyz_km("SAT-9", 0.0),
            Err(SimError::PositionOracle { .. })
        ));
    }
}
