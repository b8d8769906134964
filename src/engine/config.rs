//! Geometric-run configuration.
//!
//! A closed struct enumerating every recognised option, defaults assigned
//! at construction, then a validation pass that resolves names to node
//! indices and produces the immutable run plan. Per-bundle options accept
//! either a scalar (broadcast to every bundle) or one value per bundle.

use serde::Deserialize;

use crate::clock::parse_iso;
use crate::error::SimError;
use crate::geometry::R_LOS_DEFAULT_KM;
use crate::model::bundle::{Bundle, RoutingMode};
use crate::model::node::NodeSet;
use crate::phy::PhyProfile;

/// A per-bundle option: one value for all bundles, or one per bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PerBundle<T> {
    Scalar(T),
    List(Vec<T>),
}

impl<T: Clone> PerBundle<T> {
    /// Broadcast to `n` values, or fail when an explicit list disagrees
    /// with the bundle count.
    pub fn broadcast(&self, n: usize, option: &str) -> Result<Vec<T>, SimError> {
        match self {
            PerBundle::Scalar(v) => Ok(vec![v.clone(); n]),
            PerBundle::List(vs) if vs.len() == n => Ok(vs.clone()),
            PerBundle::List(vs) => Err(SimError::config(format!(
                "{option} lists {} values for {n} bundles",
                vs.len()
            ))),
        }
    }
}

fn default_num_bundles() -> usize {
    1
}
fn default_routing() -> String {
    "Epidemic".to_string()
}
fn default_phy_mode() -> String {
    "uhf".to_string()
}
fn default_step_seconds() -> f64 {
    60.0
}
fn default_packet_size() -> u64 {
    1024
}
fn default_release_offsets() -> PerBundle<f64> {
    PerBundle::Scalar(0.0)
}
fn default_r_los() -> f64 {
    R_LOS_DEFAULT_KM
}

/// Every recognised Mode A option.
#[derive(Debug, Clone, Deserialize)]
pub struct GeometricConfig {
    #[serde(default = "default_num_bundles")]
    pub num_bundles: usize,
    /// `Epidemic` | `PRoPHET` | `SprayAndWait`; unknown tags fall back to
    /// Epidemic with a warning.
    #[serde(default = "default_routing")]
    pub routing: String,
    /// Built-in PHY profile selector; unknown tags are fatal.
    #[serde(default = "default_phy_mode")]
    pub phy_mode: String,
    /// RFC 3339 start of the time axis.
    pub start_time: String,
    pub horizon_minutes: f64,
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,
    /// 0 disables expiry.
    #[serde(default)]
    pub ttl_minutes: f64,
    /// Bundle size used for the PHY-extra delay calculation.
    #[serde(default = "default_packet_size")]
    pub packet_size_bytes: u64,
    /// Skip the first N minutes of the time axis.
    #[serde(default)]
    pub sim_start_offset_minutes: f64,
    /// Release instants relative to `start_time`; scalar broadcast allowed.
    #[serde(default = "default_release_offsets")]
    pub bundle_release_offsets_minutes: PerBundle<f64>,
    pub bundle_src_names: PerBundle<String>,
    pub bundle_dst_names: PerBundle<String>,
    /// Spray copy budget; 0 means unlimited.
    #[serde(default)]
    pub max_copies: u32,
    /// Playback factor for live pacing; 0 means no pacing.
    #[serde(default)]
    pub real_time_speed: f64,
    /// Line-of-sight Earth radius, km.
    #[serde(default = "default_r_los")]
    pub r_los_km: f64,
}

/// The immutable run plan produced by validation.
pub struct ResolvedRun {
    /// Epoch seconds of `start_time`.
    pub start: f64,
    /// First simulated instant (`start` plus the skip offset).
    pub sim_start: f64,
    /// End of the time axis.
    pub end: f64,
    pub step_seconds: f64,
    pub routing: RoutingMode,
    pub phy: PhyProfile,
    pub r_los_km: f64,
    pub real_time_speed: f64,
    pub bundles: Vec<Bundle>,
}

impl GeometricConfig {
    /// Validate against the scenario's nodes and build the run plan.
    ///
    /// Fails fast on unknown endpoints, unknown PHY profiles, nonpositive
    /// steps, and list-length mismatches. An unknown routing tag is NOT
    /// fatal: it falls back to Epidemic, logged.
    pub fn resolve(&self, nodes: &NodeSet) -> Result<ResolvedRun, SimError> {
        if self.num_bundles == 0 {
            return Err(SimError::config("num_bundles must be at least 1"));
        }
        if self.step_seconds <= 0.0 {
            return Err(SimError::config("step_seconds must be positive"));
        }
        if self.horizon_minutes < 0.0 || self.sim_start_offset_minutes < 0.0 {
            return Err(SimError::config(
                "horizon_minutes and sim_start_offset_minutes must be non-negative",
            ));
        }
        if self.packet_size_bytes == 0 {
            return Err(SimError::config("packet_size_bytes must be positive"));
        }
        if self.ttl_minutes < 0.0 {
            return Err(SimError::config("ttl_minutes must be non-negative"));
        }

        let start = parse_iso(&self.start_time)?;
        let phy = PhyProfile::by_name(&self.phy_mode)
            .ok_or_else(|| SimError::config(format!("unknown PHY profile '{}'", self.phy_mode)))?;

        let (routing, recognised) = RoutingMode::from_tag(&self.routing);
        if !recognised {
            log::warn!(
                "unknown routing tag '{}', falling back to Epidemic",
                self.routing
            );
        }

        let n = self.num_bundles;
        let offsets = self
            .bundle_release_offsets_minutes
            .broadcast(n, "bundle_release_offsets_minutes")?;
        let srcs = self.bundle_src_names.broadcast(n, "bundle_src_names")?;
        let dsts = self.bundle_dst_names.broadcast(n, "bundle_dst_names")?;

        let ttl_seconds = (self.ttl_minutes * 60.0).round() as u64;
        let mut bundles = Vec::with_capacity(n);
        for i in 0..n {
            let src = nodes.resolve(&srcs[i], &format!("bundle {} source", i + 1))?;
            let dst = nodes.resolve(&dsts[i], &format!("bundle {} destination", i + 1))?;
            bundles.push(Bundle::new(
                (i + 1) as u64,
                src,
                dst,
                srcs[i].clone(),
                dsts[i].clone(),
                self.packet_size_bytes,
                start + offsets[i] * 60.0,
                ttl_seconds,
                self.max_copies,
                routing,
                nodes.len(),
            ));
        }

        Ok(ResolvedRun {
            start,
            sim_start: start + self.sim_start_offset_minutes * 60.0,
            end: start + self.horizon_minutes * 60.0,
            step_seconds: self.step_seconds,
            routing,
            phy,
            r_los_km: self.r_los_km,
            real_time_speed: self.real_time_speed,
            bundles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;

    fn two_stations() -> NodeSet {
        let mut nodes = NodeSet::new();
        nodes.add("GS-1", NodeKind::GroundStation).unwrap();
        nodes.add("GS-2", NodeKind::GroundStation).unwrap();
        nodes
    }

    fn base_config() -> GeometricConfig {
        serde_json::from_str(
            r#"{
                "start_time": "2026-03-01T00:00:00Z",
                "horizon_minutes": 30,
                "bundle_src_names": "GS-1",
                "bundle_dst_names": "GS-2"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_and_scalar_broadcast() {
        let mut cfg = base_config();
        cfg.num_bundles = 3;
        let run = cfg.resolve(&two_stations()).unwrap();
        assert_eq!(run.bundles.len(), 3);
        assert_eq!(run.step_seconds, 60.0);
        assert_eq!(run.routing, RoutingMode::Epidemic);
        assert!(run.bundles.iter().all(|b| b.source == 0 && b.destination == 1));
        // Default offsets release everything at start.
        assert!(run.bundles.iter().all(|b| b.release_time == run.start));
    }

    #[test]
    fn per_bundle_list_length_must_match() {
        let mut cfg = base_config();
        cfg.num_bundles = 2;
        cfg.bundle_release_offsets_minutes = PerBundle::List(vec![0.0, 5.0, 9.0]);
        assert!(matches!(
            cfg.resolve(&two_stations()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn unknown_endpoint_fails_fast() {
        let mut cfg = base_config();
        cfg.bundle_dst_names = PerBundle::Scalar("GS-9".to_string());
        assert!(matches!(
            cfg.resolve(&two_stations()),
            Err(SimError::UnknownNode { .. })
        ));
    }

    #[test]
    fn unknown_phy_profile_fails_fast() {
        let mut cfg = base_config();
        cfg.phy_mode = "laser".to_string();
        assert!(cfg.resolve(&two_stations()).is_err());
    }

    #[test]
    fn unknown_routing_tag_falls_back_to_epidemic() {
        let mut cfg = base_config();
        cfg.routing = "Flooding".to_string();
        let run = cfg.resolve(&two_stations()).unwrap();
        assert_eq!(run.routing, RoutingMode::Epidemic);
    }

    #[test]
    fn ttl_minutes_convert_to_seconds() {
        let mut cfg = base_config();
        cfg.ttl_minutes = 10.0;
        let run = cfg.resolve(&two_stations()).unwrap();
        assert_eq!(run.bundles[0].ttl_seconds, 600);
    }
}
