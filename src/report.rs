//! Event log and run reports.
//!
//! The event log is append-only and keyed by simulation timestamp. Every
//! line is mirrored through `log::info!` and, when a sink callback is
//! attached, streamed to it; sink failures are swallowed so log streaming
//! can never influence simulation state.

use serde::Serialize;

use crate::clock::fmt_iso;
use crate::model::bundle::{Bundle, Outcome};

/// Fallible consumer of event-log lines.
pub type LogSink = Box<dyn FnMut(&str) -> Result<(), Box<dyn std::error::Error>>>;

/// Append-only stream of simulation events.
#[derive(Default)]
pub struct EventLog {
    lines: Vec<String>,
    sink: Option<LogSink>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: LogSink) -> Self {
        Self {
            lines: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Append one event at simulation time `t`.
    pub fn emit(&mut self, t: f64, message: &str) {
        let line = format!("t={}: {}", fmt_iso(t), message);
        log::info!("{line}");
        if let Some(sink) = self.sink.as_mut() {
            // Best-effort streaming: a failing sink must not perturb the run.
            let _ = sink(&line);
        }
        self.lines.push(line);
    }

    pub fn released(&mut self, t: f64, bundle: &Bundle) {
        self.emit(
            t,
            &format!("bundle {} RELEASED at {}", bundle.id, bundle.source_name),
        );
    }

    pub fn forwarded(&mut self, t: f64, bundle_id: u64, from: &str, to: &str) {
        self.emit(t, &format!("bundle {bundle_id} forwarded {from} -> {to}"));
    }

    pub fn delivered(&mut self, t: f64, bundle: &Bundle) {
        self.emit(
            t,
            &format!(
                "bundle {} DELIVERED at {} hops={}",
                bundle.id, bundle.destination_name, bundle.hops
            ),
        );
    }

    pub fn expired(&mut self, t: f64, bundle: &Bundle) {
        self.emit(
            t,
            &format!(
                "bundle {} EXPIRED age={:.0}s",
                bundle.id,
                bundle.age_at(t)
            ),
        );
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Delay decomposition for a delivered bundle (Mode A).
///
/// `path_delay` dominates at DTN scale; `phy_extra` is the additive
/// per-hop serialization + handshake accounting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelayComponents {
    pub path_delay_s: f64,
    pub phy_extra_s: f64,
    pub total_delay_s: f64,
}

/// Per-bundle row of the Mode A run report.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReportEntry {
    pub id: u64,
    pub src: String,
    pub dst: String,
    pub release_time: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<String>,
    pub hops: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayComponents>,
}

/// Outcome histogram of a geometric run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GeometricSummary {
    pub delivered: usize,
    pub expired: usize,
    pub not_delivered: usize,
    pub not_simulated: usize,
    pub ticks_executed: u64,
}

impl GeometricSummary {
    pub fn nothing_simulated(&self) -> bool {
        self.ticks_executed == 0
    }
}

/// Full Mode A report, serialized to JSON for the caller.
#[derive(Debug, Clone, Serialize)]
pub struct GeometricRunReport {
    pub phy_profile: String,
    pub bit_error_rate: f64,
    pub summary: GeometricSummary,
    pub bundles: Vec<BundleReportEntry>,
}

/// One delivered bundle in Mode B; exactly one per delivered id.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRecord {
    pub bundle_id: u64,
    pub created_at: String,
    pub delivered_at: String,
    pub size_bytes: u64,
    pub latency_seconds: f64,
}

/// Byte ledger of one buffer (a satellite's, or the source's).
#[derive(Debug, Clone, Serialize)]
pub struct BufferTotals {
    pub name: String,
    pub bytes_in: u64,
    pub bytes_dropped: u64,
}

/// Aggregate counters of a contact-plan run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlanCounters {
    pub created: u64,
    pub delivered: u64,
    pub ttl_drops: u64,
    pub buffer_drops: u64,
    pub dup_suppressed: u64,
    pub in_flight: u64,
    pub downlink_transfers: u64,
    pub air_bytes: f64,
    pub payload_bytes_delivered: u64,
}

/// Full Mode B report.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRunReport {
    pub counters: PlanCounters,
    pub deliveries: Vec<DeliveryRecord>,
    pub satellites: Vec<BufferTotals>,
    pub source: BufferTotals,
}
