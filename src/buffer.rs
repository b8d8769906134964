//! Bounded per-node buffers with eviction policies.
//!
//! A queue entry is a reference to a bundle copy: the queue owns the
//! entry, never the bundle itself. Capacity is in bytes; admission evicts
//! victims under the configured policy until the newcomer fits, and drops
//! the newcomer itself if eviction cannot make room. Random eviction
//! draws from the run's single seeded RNG stream so replays are
//! bit-identical.

use std::collections::VecDeque;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Victim-selection policy applied when admission would exceed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Head of the FIFO (the longest-queued entry).
    Oldest,
    /// Maximum size; ties resolved to the lowest index.
    Largest,
    /// Uniform index from the seeded RNG.
    Random,
}

/// A queued bundle copy.
///
/// `size_bytes` is the amount still to push through the queue's link: a
/// partial contact transfer decrements it in place and the entry stays at
/// the head for the next window. `ready_at` matters only on satellite
/// queues (earliest downlink eligibility); it is set once at admission.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub bundle_id: u64,
    pub created_at: f64,
    pub size_bytes: u64,
    pub ttl_seconds: u64,
    pub ready_at: f64,
}

impl QueueEntry {
    /// TTL cutoff: entries older than this are unusable. `None` when the
    /// bundle's TTL is disabled.
    pub fn deadline(&self) -> Option<f64> {
        (self.ttl_seconds > 0).then(|| self.created_at + self.ttl_seconds as f64)
    }
}

/// Bounded FIFO of bundle copies with byte accounting.
#[derive(Debug)]
pub struct BundleQueue {
    entries: VecDeque<QueueEntry>,
    capacity_bytes: u64,
    current_bytes: u64,
    policy: DropPolicy,
    /// Bytes ever admitted (ledger: byte-in total).
    pub bytes_in: u64,
    /// Bytes lost to eviction or rejected admission (ledger total).
    pub bytes_dropped: u64,
    /// Entries lost to eviction or rejected admission.
    pub buffer_drops: u64,
}

impl BundleQueue {
    pub fn new(capacity_bytes: u64, policy: DropPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity_bytes,
            current_bytes: 0,
            policy,
            bytes_in: 0,
            bytes_dropped: 0,
            buffer_drops: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.current_bytes
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Record that the head entry shrank by `bytes` after a partial
    /// transfer; keeps `current_bytes` consistent with the entries.
    pub fn shrink_front(&mut self, bytes: u64) {
        if let Some(head) = self.entries.front_mut() {
            debug_assert!(head.size_bytes >= bytes);
            head.size_bytes -= bytes;
            self.current_bytes -= bytes;
        }
    }

    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.pop_front()?;
        self.current_bytes -= entry.size_bytes;
        Some(entry)
    }

    pub fn push_back_unchecked(&mut self, entry: QueueEntry) {
        self.current_bytes += entry.size_bytes;
        self.entries.push_back(entry);
    }

    /// Admit an entry, evicting under the policy until it fits.
    ///
    /// Returns true when the entry was enqueued. When even an empty queue
    /// cannot hold it, the newcomer itself is the drop.
    pub fn admit(&mut self, entry: QueueEntry, rng: &mut StdRng) -> bool {
        let need = entry.size_bytes;
        while self.current_bytes + need > self.capacity_bytes && !self.entries.is_empty() {
            let victim_idx = self.select_victim(rng);
            let Some(victim) = self.entries.remove(victim_idx) else {
                break;
            };
            self.current_bytes -= victim.size_bytes;
            self.bytes_dropped += victim.size_bytes;
            self.buffer_drops += 1;
            log::debug!(
                "buffer: evicted bundle {} ({} B, policy {:?})",
                victim.bundle_id,
                victim.size_bytes,
                self.policy
            );
        }

        if self.current_bytes + need <= self.capacity_bytes {
            self.bytes_in += need;
            self.push_back_unchecked(entry);
            true
        } else {
            self.bytes_dropped += need;
            self.buffer_drops += 1;
            false
        }
    }

    fn select_victim(&self, rng: &mut StdRng) -> usize {
        match self.policy {
            DropPolicy::Oldest => 0,
            DropPolicy::Largest => {
                let mut best = 0;
                for (i, e) in self.entries.iter().enumerate() {
                    if e.size_bytes > self.entries[best].size_bytes {
                        best = i;
                    }
                }
                best
            }
            DropPolicy::Random => rng.gen_range(0..self.entries.len()),
        }
    }

    /// Evict every entry whose TTL elapsed before `now`; returns the
    /// evicted entries for drop accounting.
    pub fn sweep_expired(&mut self, now: f64) -> Vec<QueueEntry> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match entry.deadline() {
                Some(deadline) if deadline < now => {
                    self.current_bytes -= entry.size_bytes;
                    expired.push(entry);
                }
                _ => kept.push_back(entry),
            }
        }
        self.entries = kept;
        expired
    }

    /// Remove every entry referencing `bundle_id` (bundle deleted from
    /// the registry: TTL expiry or delivery with no further copies).
    /// Returns the number of entries removed.
    pub fn purge_bundle(&mut self, bundle_id: u64) -> usize {
        let mut kept = VecDeque::with_capacity(self.entries.len());
        let mut purged = 0;
        for entry in self.entries.drain(..) {
            if entry.bundle_id == bundle_id {
                self.current_bytes -= entry.size_bytes;
                purged += 1;
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        purged
    }
}
