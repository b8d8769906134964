//! Scenario loading, parsing, and validation.
//!
//! A scenario file is one JSON document selecting the run mode and
//! carrying the node list plus the mode's configuration block. Loading
//! follows load → parse → validate; validation failures carry a specific
//! diagnostic naming the offending node or field.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::engine::config::GeometricConfig;
use crate::error::SimError;
use crate::model::node::{NodeKind, NodeSet, ScenarioOracle};
use crate::scheduler::config::PlanConfig;

/// Mean equatorial Earth radius; orbits must clear it.
const EARTH_RADIUS_KM: f64 = 6378.137;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Mode A: adjacency derived from geometry every tick.
    Geometric,
    /// Mode B: pre-materialised contact plan.
    ContactPlan,
}

/// One node entry of the scenario file.
///
/// Ground stations carry geodetic coordinates; satellites carry
/// circular-orbit parameters for the built-in propagator.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub latitude_deg: Option<f64>,
    #[serde(default)]
    pub longitude_deg: Option<f64>,
    #[serde(default)]
    pub altitude_km: f64,
    #[serde(default)]
    pub orbit: Option<crate::model::node::CircularOrbit>,
}

/// Root structure of a scenario file.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub mode: RunMode,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub geometric: Option<GeometricConfig>,
    #[serde(default)]
    pub contact_plan: Option<PlanConfig>,
}

impl Scenario {
    pub fn geometric_config(&self) -> Result<&GeometricConfig, SimError> {
        self.geometric
            .as_ref()
            .ok_or_else(|| SimError::config("geometric mode requires a 'geometric' block"))
    }

    pub fn plan_config(&self) -> Result<&PlanConfig, SimError> {
        self.contact_plan
            .as_ref()
            .ok_or_else(|| SimError::config("contact-plan mode requires a 'contact_plan' block"))
    }
}

/// Load and parse a scenario from a file.
pub fn load_scenario(path: &Path) -> Result<Scenario, SimError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))
        .map_err(|e| SimError::Config(e.to_string()))?;
    let scenario: Scenario = serde_json::from_str(&data)?;
    Ok(scenario)
}

/// Build the node set and position oracle for a geometric run.
///
/// Rejects malformed inputs with a diagnostic: ground stations without
/// coordinates, out-of-range latitudes/longitudes, satellites without
/// orbit parameters, and orbits that do not clear the Earth.
pub fn build_world(scenario: &Scenario) -> Result<(NodeSet, ScenarioOracle), SimError> {
    if scenario.nodes.is_empty() {
        return Err(SimError::config("scenario must define at least one node"));
    }

    let mut nodes = NodeSet::new();
    let mut oracle = ScenarioOracle::new();

    for spec in &scenario.nodes {
        nodes.add(&spec.name, spec.kind)?;
        match spec.kind {
            NodeKind::GroundStation => {
                let (lat, lon) = match (spec.latitude_deg, spec.longitude_deg) {
                    (Some(lat), Some(lon)) => (lat, lon),
                    _ => {
                        return Err(SimError::config(format!(
                            "ground station '{}' needs latitude_deg and longitude_deg",
                            spec.name
                        )));
                    }
                };
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(SimError::config(format!(
                        "ground station '{}' latitude {} outside -90..=90",
                        spec.name, lat
                    )));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(SimError::config(format!(
                        "ground station '{}' longitude {} outside -180..=180",
                        spec.name, lon
                    )));
                }
                oracle.add_ground_station(&spec.name, lat, lon, spec.altitude_km);
            }
            NodeKind::Satellite => {
                let orbit = spec.orbit.ok_or_else(|| {
                    SimError::config(format!("satellite '{}' needs orbit parameters", spec.name))
                })?;
                if orbit.radius_km <= EARTH_RADIUS_KM {
                    return Err(SimError::config(format!(
                        "satellite '{}' orbit radius {} km does not clear the Earth",
                        spec.name, orbit.radius_km
                    )));
                }
                oracle.add_satellite(&spec.name, orbit);
            }
        }
    }

    Ok((nodes, oracle))
}
