//! Contact-plan run configuration.

use serde::Deserialize;

use crate::buffer::DropPolicy;
use crate::clock::parse_iso;
use crate::error::SimError;

/// Copy strategy of the plan scheduler. Unlike Mode A's routing tags this
/// has no documented fallback: an unknown tag is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanRouting {
    /// One copy rides the first satellite that takes it.
    Single,
    /// Up to `spray_copies` copies ride distinct passes.
    Spray,
}

fn default_policy() -> DropPolicy {
    DropPolicy::Oldest
}
fn default_routing() -> PlanRouting {
    PlanRouting::Single
}
fn default_spray_copies() -> u32 {
    4
}
fn default_min_dwell() -> f64 {
    300.0
}
fn default_arq_factor() -> f64 {
    1.05
}

/// Every recognised Mode B option.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    /// RFC 3339 bounds of the simulated span.
    pub start_time: String,
    pub stop_time: String,
    /// Per-second Bernoulli probability of a bundle-create event.
    pub lambda_msg_per_second: f64,
    pub msg_size_bytes: u64,
    pub source_buffer_bytes: u64,
    pub satellite_buffer_bytes: u64,
    #[serde(default = "default_policy")]
    pub buffer_policy: DropPolicy,
    #[serde(default = "default_routing")]
    pub routing: PlanRouting,
    #[serde(default = "default_spray_copies")]
    pub spray_copies: u32,
    /// Minimum satellite dwell before a copy may downlink; 0 disables.
    #[serde(default = "default_min_dwell")]
    pub min_dwell_seconds: f64,
    /// 0 disables expiry.
    #[serde(default)]
    pub ttl_seconds: u64,
    /// Multiplicative retransmission overhead on air bytes.
    #[serde(default = "default_arq_factor")]
    pub arq_factor: f64,
    /// Path to the contact-plan JSON; absent for programmatic sources.
    #[serde(default)]
    pub contact_plan_source: Option<String>,
    /// RNG seed for eviction and workload draws.
    #[serde(default)]
    pub seed: u64,
}

/// Validated plan-run parameters, times in epoch seconds.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub start: f64,
    pub stop: f64,
    pub lambda: f64,
    pub msg_size_bytes: u64,
    pub source_buffer_bytes: u64,
    pub satellite_buffer_bytes: u64,
    pub buffer_policy: DropPolicy,
    /// Copy budget per bundle: 1 for single, `spray_copies` for spray.
    pub copies: u32,
    pub min_dwell_seconds: f64,
    pub ttl_seconds: u64,
    pub arq_factor: f64,
    pub seed: u64,
}

impl PlanConfig {
    pub fn resolve(&self) -> Result<ResolvedPlan, SimError> {
        let start = parse_iso(&self.start_time)?;
        let stop = parse_iso(&self.stop_time)?;
        if stop <= start {
            return Err(SimError::config("stop_time must be after start_time"));
        }
        if !(0.0..=1.0).contains(&self.lambda_msg_per_second) {
            return Err(SimError::config(
                "lambda_msg_per_second is a per-second probability and must lie in [0, 1]",
            ));
        }
        if self.msg_size_bytes == 0 {
            return Err(SimError::config("msg_size_bytes must be positive"));
        }
        if self.arq_factor < 1.0 {
            return Err(SimError::config("arq_factor must be at least 1.0"));
        }
        if self.min_dwell_seconds < 0.0 {
            return Err(SimError::config("min_dwell_seconds must be non-negative"));
        }
        let copies = match self.routing {
            PlanRouting::Single => 1,
            PlanRouting::Spray => {
                if self.spray_copies == 0 {
                    return Err(SimError::config(
                        "spray routing requires spray_copies of at least 1",
                    ));
                }
                self.spray_copies
            }
        };

        Ok(ResolvedPlan {
            start,
            stop,
            lambda: self.lambda_msg_per_second,
            msg_size_bytes: self.msg_size_bytes,
            source_buffer_bytes: self.source_buffer_bytes,
            satellite_buffer_bytes: self.satellite_buffer_bytes,
            buffer_policy: self.buffer_policy,
            copies,
            min_dwell_seconds: self.min_dwell_seconds,
            ttl_seconds: self.ttl_seconds,
            arq_factor: self.arq_factor,
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_json() -> serde_json::Value {
        serde_json::json!({
            "start_time": "2026-03-01T00:00:00Z",
            "stop_time": "2026-03-08T00:00:00Z",
            "lambda_msg_per_second": 0.001,
            "msg_size_bytes": 4096,
            "source_buffer_bytes": 1_000_000,
            "satellite_buffer_bytes": 500_000
        })
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg: PlanConfig = serde_json::from_value(base_json()).unwrap();
        let plan = cfg.resolve().unwrap();
        assert_eq!(plan.copies, 1);
        assert_eq!(plan.min_dwell_seconds, 300.0);
        assert_eq!(plan.arq_factor, 1.05);
        assert_eq!(plan.ttl_seconds, 0);
        assert_eq!(plan.stop - plan.start, 7.0 * 86_400.0);
    }

    #[test]
    fn unknown_routing_tag_fails_at_parse_time() {
        let mut json = base_json();
        json["routing"] = "flooding".into();
        assert!(serde_json::from_value::<PlanConfig>(json).is_err());
    }

    #[test]
    fn spray_requires_a_positive_copy_budget() {
        let mut json = base_json();
        json["routing"] = "spray".into();
        json["spray_copies"] = 0.into();
        let cfg: PlanConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(cfg.resolve(), Err(SimError::Config(_))));
    }

    #[test]
    fn inverted_time_span_fails_fast() {
        let mut json = base_json();
        json["stop_time"] = "2026-02-01T00:00:00Z".into();
        let cfg: PlanConfig = serde_json::from_value(json).unwrap();
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn lambda_outside_unit_interval_is_rejected() {
        let mut json = base_json();
        json["lambda_msg_per_second"] = 2.0.into();
        let cfg: PlanConfig = serde_json::from_value(json).unwrap();
        assert!(cfg.resolve().is_err());
    }
}
