//! Contact windows and contact-plan sources.
//!
//! A contact window is a directed link opportunity between the ground
//! segment and one satellite, pre-computed by an external pass-prediction
//! tool and consumed here read-only. Windows are processed in ascending
//! start order with `(satellite, link)` as the tie-break, which the plan
//! source guarantees by sorting after load.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::clock::parse_iso;
use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// Ground-station source → satellite.
    Uplink,
    /// Satellite → ground-station destination.
    Downlink,
}

impl LinkDirection {
    pub fn tag(&self) -> &'static str {
        match self {
            LinkDirection::Uplink => "uplink",
            LinkDirection::Downlink => "downlink",
        }
    }
}

/// One directed contact opportunity, immutable during a run.
///
/// Times are epoch seconds. Invariants enforced by the plan sources:
/// `end > start` and `capacity_bytes == rate_bytes_per_second * duration`.
#[derive(Debug, Clone)]
pub struct ContactWindow {
    pub satellite: String,
    pub link: LinkDirection,
    pub start: f64,
    pub end: f64,
    pub duration_seconds: f64,
    pub mean_elev_deg: f64,
    pub max_elev_deg: f64,
    pub mean_range_km: f64,
    pub rate_bytes_per_second: f64,
    pub capacity_bytes: f64,
    pub propagation_delay_seconds: f64,
}

impl ContactWindow {
    /// Ascending start, ties broken by `(satellite, link)` lexicographic
    /// on the serialized tags (so `downlink` sorts before `uplink`).
    fn plan_order(&self, other: &ContactWindow) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then_with(|| self.satellite.cmp(&other.satellite))
            .then_with(|| self.link.tag().cmp(other.link.tag()))
    }
}

/// Serialized form of one plan row, timestamps as RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactWindowRecord {
    pub satellite: String,
    pub link: LinkDirection,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub mean_elev_deg: f64,
    #[serde(default)]
    pub max_elev_deg: f64,
    #[serde(default)]
    pub mean_range_km: f64,
    #[serde(default)]
    pub mean_rate_mbps: f64,
    pub rate_bytes_per_second: f64,
    #[serde(default)]
    pub capacity_bytes: f64,
    #[serde(default)]
    pub propagation_delay_seconds: f64,
}

impl ContactWindowRecord {
    fn into_window(self) -> Result<ContactWindow, SimError> {
        let start = parse_iso(&self.start_time)?;
        let end = parse_iso(&self.end_time)?;
        if end <= start {
            return Err(SimError::ContactPlan(format!(
                "window for '{}' ({}) ends at or before its start",
                self.satellite,
                self.link.tag()
            )));
        }
        if self.rate_bytes_per_second <= 0.0 {
            return Err(SimError::ContactPlan(format!(
                "window for '{}' has non-positive rate {}",
                self.satellite, self.rate_bytes_per_second
            )));
        }

        let duration = if self.duration_seconds > 0.0 {
            self.duration_seconds
        } else {
            end - start
        };

        // Restore the capacity invariant rather than aborting: recorded
        // capacities drift when plans are hand-edited.
        let expected_capacity = self.rate_bytes_per_second * duration;
        if self.capacity_bytes > 0.0 && (self.capacity_bytes - expected_capacity).abs() > 1.0 {
            log::warn!(
                "contact plan: window for '{}' at {} carries capacity {} but rate*duration is {}; using the product",
                self.satellite,
                self.start_time,
                self.capacity_bytes,
                expected_capacity
            );
        }

        Ok(ContactWindow {
            satellite: self.satellite,
            link: self.link,
            start,
            end,
            duration_seconds: duration,
            mean_elev_deg: self.mean_elev_deg,
            max_elev_deg: self.max_elev_deg,
            mean_range_km: self.mean_range_km,
            rate_bytes_per_second: self.rate_bytes_per_second,
            capacity_bytes: expected_capacity,
            propagation_delay_seconds: self.propagation_delay_seconds,
        })
    }
}

/// Provider of the pre-materialised contact sequence for Mode B.
pub trait ContactPlanSource {
    /// Windows overlapping `[start, stop]`, sorted in plan order.
    fn contacts(&self, start: f64, stop: f64) -> Result<Vec<ContactWindow>, SimError>;
}

/// Contact plan held in memory; used by tests and by programmatic runs.
pub struct InMemoryPlan {
    windows: Vec<ContactWindow>,
}

impl InMemoryPlan {
    pub fn new(mut windows: Vec<ContactWindow>) -> Self {
        windows.sort_by(|a, b| a.plan_order(b));
        Self { windows }
    }
}

impl ContactPlanSource for InMemoryPlan {
    fn contacts(&self, start: f64, stop: f64) -> Result<Vec<ContactWindow>, SimError> {
        Ok(self
            .windows
            .iter()
            .filter(|w| w.end > start && w.start < stop)
            .cloned()
            .collect())
    }
}

/// Contact plan loaded from a JSON file of [`ContactWindowRecord`] rows.
pub struct JsonPlanFile {
    plan: InMemoryPlan,
}

impl JsonPlanFile {
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read contact plan: {}", path.display()))
            .map_err(|e| SimError::ContactPlan(e.to_string()))?;
        let records: Vec<ContactWindowRecord> = serde_json::from_str(&data)
            .context("Invalid contact plan JSON")
            .map_err(|e| SimError::ContactPlan(e.to_string()))?;
        let windows = records
            .into_iter()
            .map(ContactWindowRecord::into_window)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            plan: InMemoryPlan::new(windows),
        })
    }
}

impl ContactPlanSource for JsonPlanFile {
    fn contacts(&self, start: f64, stop: f64) -> Result<Vec<ContactWindow>, SimError> {
        self.plan.contacts(start, stop)
    }
}
