//! Bundles and their lifecycle.
//!
//! A bundle is the DTN unit of payload. Its state machine is strictly
//! forward: unborn → born → (delivered | expired), and once finalised no
//! further mutation is allowed. Custody is a holder *set* (no exclusive
//! transfer): the [`HolderSet`] keeps insertion order for deterministic
//! traversal while giving O(1) membership.

use serde::{Deserialize, Serialize};

/// Routing modes of the geometric engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    Epidemic,
    ProphetLike,
    SprayAndWait,
}

impl RoutingMode {
    /// Parse a configuration tag. Unknown tags fall back to Epidemic; the
    /// caller logs the fallback.
    pub fn from_tag(tag: &str) -> (RoutingMode, bool) {
        match tag {
            "Epidemic" => (RoutingMode::Epidemic, true),
            "PRoPHET" => (RoutingMode::ProphetLike, true),
            "SprayAndWait" => (RoutingMode::SprayAndWait, true),
            _ => (RoutingMode::Epidemic, false),
        }
    }
}

/// Terminal (or end-of-run) classification of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Delivered,
    Expired,
    NotDelivered,
    NotSimulated,
}

/// Set of node indices with insertion-ordered iteration.
///
/// Membership is a dense bool vector sized to the node count; traversal
/// order is the order holders were added, which is what makes replays
/// reproduce forwarding decisions exactly.
#[derive(Debug, Clone)]
pub struct HolderSet {
    order: Vec<usize>,
    member: Vec<bool>,
}

impl HolderSet {
    pub fn new(node_count: usize) -> Self {
        Self {
            order: Vec::new(),
            member: vec![false; node_count],
        }
    }

    /// Insert a node index; returns false if already present.
    pub fn insert(&mut self, node: usize) -> bool {
        if self.member[node] {
            return false;
        }
        self.member[node] = true;
        self.order.push(node);
        true
    }

    pub fn contains(&self, node: usize) -> bool {
        self.member[node]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Holder at insertion position `i`.
    pub fn at(&self, i: usize) -> usize {
        self.order[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }
}

/// A DTN bundle tracked by the geometric engine.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub id: u64,
    pub source: usize,
    pub destination: usize,
    pub source_name: String,
    pub destination_name: String,
    pub size_bytes: u64,
    /// Epoch seconds at which the bundle becomes eligible for custody.
    pub release_time: f64,
    /// 0 disables expiry.
    pub ttl_seconds: u64,
    /// Spray copy budget; 0 means unlimited (Epidemic behaviour).
    pub max_copies: u32,
    pub copies_used: u32,
    pub routing: RoutingMode,
    pub holders: HolderSet,
    pub hops: u32,
    pub born: bool,
    pub delivered: bool,
    pub delivered_at: Option<f64>,
    pub expired: bool,
    pub expired_at: Option<f64>,
}

impl Bundle {
    pub fn new(
        id: u64,
        source: usize,
        destination: usize,
        source_name: String,
        destination_name: String,
        size_bytes: u64,
        release_time: f64,
        ttl_seconds: u64,
        max_copies: u32,
        routing: RoutingMode,
        node_count: usize,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            source_name,
            destination_name,
            size_bytes,
            release_time,
            ttl_seconds,
            max_copies,
            copies_used: 0,
            routing,
            holders: HolderSet::new(node_count),
            hops: 0,
            born: false,
            delivered: false,
            delivered_at: None,
            expired: false,
            expired_at: None,
        }
    }

    /// Delivered or expired bundles accept no further state changes.
    pub fn is_final(&self) -> bool {
        self.delivered || self.expired
    }

    /// First tick at or after the release time: the source takes custody
    /// and, under Spray, the source counts as one used copy.
    pub fn birth(&mut self) {
        debug_assert!(!self.born);
        self.born = true;
        self.holders.insert(self.source);
        self.copies_used = 1;
    }

    pub fn mark_delivered(&mut self, t: f64) {
        debug_assert!(!self.is_final());
        debug_assert!(self.holders.contains(self.destination));
        self.delivered = true;
        self.delivered_at = Some(t);
    }

    pub fn mark_expired(&mut self, t: f64) {
        debug_assert!(!self.is_final());
        self.expired = true;
        self.expired_at = Some(t);
    }

    /// Age relative to release; meaningful only after birth.
    pub fn age_at(&self, t: f64) -> f64 {
        t - self.release_time
    }

    /// TTL check: enabled and past its allowance at `t`.
    pub fn ttl_exceeded_at(&self, t: f64) -> bool {
        self.ttl_seconds > 0 && self.age_at(t) > self.ttl_seconds as f64
    }

    pub fn outcome(&self, simulation_end: f64) -> Outcome {
        if self.delivered {
            Outcome::Delivered
        } else if self.expired {
            Outcome::Expired
        } else if self.release_time > simulation_end {
            Outcome::NotSimulated
        } else {
            Outcome::NotDelivered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(release: f64, ttl: u64, max_copies: u32) -> Bundle {
        Bundle::new(
            1,
            0,
            1,
            "GS-1".into(),
            "GS-2".into(),
            1024,
            release,
            ttl,
            max_copies,
            RoutingMode::Epidemic,
            4,
        )
    }

    #[test]
    fn holder_set_keeps_insertion_order_and_membership() {
        let mut holders = HolderSet::new(5);
        assert!(holders.insert(3));
        assert!(holders.insert(0));
        assert!(!holders.insert(3));
        assert!(holders.contains(0));
        assert!(!holders.contains(4));
        assert_eq!(holders.iter().collect::<Vec<_>>(), vec![3, 0]);
        assert_eq!(holders.len(), 2);
    }

    #[test]
    fn birth_installs_source_custody() {
        let mut b = bundle(100.0, 0, 0);
        assert!(!b.born);
        b.birth();
        assert!(b.born);
        assert!(b.holders.contains(0));
        assert_eq!(b.copies_used, 1);
    }

    #[test]
    fn ttl_disabled_never_exceeds() {
        let mut b = bundle(0.0, 0, 0);
        b.birth();
        assert!(!b.ttl_exceeded_at(1e9));
    }

    #[test]
    fn ttl_boundary_is_strictly_greater_than() {
        let mut b = bundle(100.0, 600, 0);
        b.birth();
        assert!(!b.ttl_exceeded_at(700.0)); // age == ttl
        assert!(b.ttl_exceeded_at(700.1));
    }

    #[test]
    fn outcome_classification_is_exhaustive() {
        let end = 1000.0;

        let mut delivered = bundle(0.0, 0, 0);
        delivered.birth();
        delivered.holders.insert(1);
        delivered.mark_delivered(60.0);
        assert_eq!(delivered.outcome(end), Outcome::Delivered);

        let mut expired = bundle(0.0, 10, 0);
        expired.birth();
        expired.mark_expired(20.0);
        assert_eq!(expired.outcome(end), Outcome::Expired);

        let in_window = bundle(500.0, 0, 0);
        assert_eq!(in_window.outcome(end), Outcome::NotDelivered);

        let late = bundle(2000.0, 0, 0);
        assert_eq!(late.outcome(end), Outcome::NotSimulated);
    }

    #[test]
    fn routing_tag_parsing_falls_back_to_epidemic() {
        assert_eq!(
            RoutingMode::from_tag("SprayAndWait"),
            (RoutingMode::SprayAndWait, true)
        );
        assert_eq!(
            RoutingMode::from_tag("PRoPHET"),
            (RoutingMode::ProphetLike, true)
        );
        let (mode, recognised) = RoutingMode::from_tag("Flooding");
        assert_eq!(mode, RoutingMode::Epidemic);
        assert!(!recognised);
    }
}
