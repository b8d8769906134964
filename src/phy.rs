//! PHY profiles and per-hop delay accounting.
//!
//! The physical layer is deliberately flat: a profile contributes a
//! maximum range to the adjacency test and a serialization-plus-handshake
//! delay to the final per-hop accounting. The bit error rate is recorded
//! in run reports but no frame loss is modelled; retransmission overhead
//! is instead captured by the contact scheduler's single multiplicative
//! ARQ factor.

use serde::{Deserialize, Serialize};

/// A named physical-layer profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyProfile {
    pub name: String,
    /// Link data rate in bits per second.
    pub data_rate_bps: u64,
    /// Fixed per-hop handshake cost in seconds (carrier acquisition,
    /// framing, link-layer negotiation).
    pub handshake_overhead_s: f64,
    /// Maximum usable slant range in kilometres.
    pub max_range_km: f64,
    /// Recorded for reporting only; frame loss is not modelled.
    pub bit_error_rate: f64,
}

impl PhyProfile {
    /// Look up a built-in profile by its `phyMode` tag.
    ///
    /// Tags are case-insensitive. Returns `None` for unknown tags; the
    /// caller decides whether that is fatal (it is, for run configs).
    pub fn by_name(tag: &str) -> Option<PhyProfile> {
        let p = match tag.to_ascii_lowercase().as_str() {
            "uhf" => PhyProfile {
                name: "uhf".into(),
                data_rate_bps: 9_600,
                handshake_overhead_s: 2.0,
                max_range_km: 2_500.0,
                bit_error_rate: 1e-5,
            },
            "sband" => PhyProfile {
                name: "sband".into(),
                data_rate_bps: 2_000_000,
                handshake_overhead_s: 0.5,
                max_range_km: 5_000.0,
                bit_error_rate: 1e-6,
            },
            "xband" => PhyProfile {
                name: "xband".into(),
                data_rate_bps: 50_000_000,
                handshake_overhead_s: 0.2,
                max_range_km: 40_000.0,
                bit_error_rate: 1e-7,
            },
            _ => return None,
        };
        Some(p)
    }

    /// Time to clock `size_bytes` onto the link at the profile rate.
    pub fn transmit_seconds(&self, size_bytes: u64) -> f64 {
        (size_bytes as f64 * 8.0) / self.data_rate_bps as f64
    }

    /// Per-hop PHY delay: serialization plus the handshake constant.
    ///
    /// Multiplied by the hop count in the delivered-bundle delay report;
    /// purely additive next to DTN-scale path delay.
    pub fn per_hop_extra_seconds(&self, size_bytes: u64) -> f64 {
        self.transmit_seconds(size_bytes) + self.handshake_overhead_s
    }
}
