//! Three-phase per-contact scheduling.
//!
//! Contacts are consumed in ascending start order (ties broken by the
//! plan source). Each window runs:
//!
//! 1. TTL sweep of the two queues the contact touches.
//! 2. Transfer under the window's byte budget, FIFO, with partial
//!    carry-over: uplinks admit copies into the satellite buffer with a
//!    set-once `ready_at`; downlinks deliver with duplicate suppression.
//! 3. Air-byte accounting: every byte that crossed, ARQ factor applied.
//!
//! All state is owned by this single-threaded loop; the stop flag is
//! polled once per contact, so cancellation always observes whole-contact
//! boundaries.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::buffer::{BundleQueue, QueueEntry};
use crate::clock::{StopFlag, fmt_iso};
use crate::error::SimError;
use crate::model::contact::{ContactPlanSource, ContactWindow, LinkDirection};
use crate::report::{BufferTotals, DeliveryRecord, EventLog, PlanCounters, PlanRunReport};
use crate::scheduler::config::ResolvedPlan;
use crate::scheduler::workload::{self, WorkloadBundle};

/// Registry entry for one bundle. The registry owns the bundle; queue
/// entries only reference it by id.
struct BundleState {
    size_bytes: u64,
    copies_sent: u32,
}

pub struct PlanScheduler<'a> {
    plan: ResolvedPlan,
    contacts: &'a dyn ContactPlanSource,
    workload_override: Option<Vec<WorkloadBundle>>,
    stop: StopFlag,
}

impl<'a> PlanScheduler<'a> {
    pub fn new(plan: ResolvedPlan, contacts: &'a dyn ContactPlanSource) -> Self {
        Self {
            plan,
            contacts,
            workload_override: None,
            stop: StopFlag::new(),
        }
    }

    /// Replace the generated workload with an explicit one (programmatic
    /// runs and tests).
    #[allow(dead_code)]
    pub fn with_workload(mut self, bundles: Vec<WorkloadBundle>) -> Self {
        self.workload_override = Some(bundles);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn run(self, log: &mut EventLog) -> Result<PlanRunReport, SimError> {
        let plan = self.plan;
        let windows = self.contacts.contacts(plan.start, plan.stop)?;
        let mut rng = StdRng::seed_from_u64(plan.seed);
        let workload = match self.workload_override {
            Some(bundles) => bundles,
            None => workload::generate(
                plan.start,
                plan.stop,
                plan.lambda,
                plan.msg_size_bytes,
                &mut rng,
            ),
        };

        let mut states: HashMap<u64, BundleState> = workload
            .iter()
            .map(|b| {
                (
                    b.id,
                    BundleState {
                        size_bytes: b.size_bytes,
                        copies_sent: 0,
                    },
                )
            })
            .collect();
        let mut counters = PlanCounters {
            created: workload.len() as u64,
            ..Default::default()
        };
        let mut source_queue = BundleQueue::new(plan.source_buffer_bytes, plan.buffer_policy);
        let mut sat_queues: BTreeMap<String, BundleQueue> = BTreeMap::new();
        let mut delivered_ids: HashSet<u64> = HashSet::new();
        let mut deliveries: Vec<DeliveryRecord> = Vec::new();
        let mut pending = 0usize;

        for window in &windows {
            if self.stop.is_set() {
                log::warn!(
                    "stop requested before contact at {}; finishing with summary",
                    fmt_iso(window.start)
                );
                break;
            }

            // Bundles created before this window ends enter the source
            // buffer now; admission may already evict under pressure.
            admit_created(
                &workload,
                &mut pending,
                |b| b.created_at < window.end,
                &plan,
                &mut source_queue,
                &mut rng,
                log,
            );

            log::debug!(
                "contact {} {} [{} .. {}] {:.0} s, rate {:.0} B/s, range {:.0} km, elev {:.0}/{:.0} deg",
                window.satellite,
                window.link.tag(),
                fmt_iso(window.start),
                fmt_iso(window.end),
                window.duration_seconds,
                window.rate_bytes_per_second,
                window.mean_range_km,
                window.mean_elev_deg,
                window.max_elev_deg
            );

            let sat_queue = sat_queues
                .entry(window.satellite.clone())
                .or_insert_with(|| BundleQueue::new(plan.satellite_buffer_bytes, plan.buffer_policy));

            // Phase 1: TTL sweep of the source and this satellite.
            let mut expired_bundles: Vec<u64> = Vec::new();
            let swept: Vec<QueueEntry> = source_queue
                .sweep_expired(window.start)
                .into_iter()
                .chain(sat_queue.sweep_expired(window.start))
                .collect();
            for entry in swept {
                counters.ttl_drops += 1;
                expired_bundles.push(entry.bundle_id);
                log.emit(
                    window.start,
                    &format!("bundle {} EXPIRED in queue", entry.bundle_id),
                );
            }

            // Phase 2: transfer under the byte budget.
            let bytes_crossed = match window.link {
                LinkDirection::Uplink => run_uplink(
                    window,
                    &plan,
                    &mut source_queue,
                    sat_queue,
                    &mut states,
                    &mut counters,
                    &mut expired_bundles,
                    &mut rng,
                    log,
                ),
                LinkDirection::Downlink => run_downlink(
                    window,
                    sat_queue,
                    &states,
                    &mut delivered_ids,
                    &mut deliveries,
                    &mut counters,
                    &mut expired_bundles,
                    log,
                ),
            };

            // Phase 3: air bytes: everything that crossed, including
            // transfer-time TTL drops and duplicates, times the ARQ factor.
            counters.air_bytes += bytes_crossed as f64 * plan.arq_factor;

            // Lifecycle: an expired bundle's surviving copies leave every
            // queue with it.
            for id in expired_bundles {
                let mut purged = source_queue.purge_bundle(id);
                for q in sat_queues.values_mut() {
                    purged += q.purge_bundle(id);
                }
                counters.ttl_drops += purged as u64;
            }
        }

        // Bundles created after the final contact still sit at the source.
        admit_created(
            &workload,
            &mut pending,
            |_| true,
            &plan,
            &mut source_queue,
            &mut rng,
            log,
        );

        counters.buffer_drops = source_queue.buffer_drops
            + sat_queues.values().map(|q| q.buffer_drops).sum::<u64>();
        counters.in_flight = (source_queue.len()
            + sat_queues.values().map(|q| q.len()).sum::<usize>()) as u64;

        log::info!(
            "plan run summary: {} created, {} delivered, {} ttl drops, {} buffer drops, {} duplicates suppressed, {} in flight, {:.0} air bytes",
            counters.created,
            counters.delivered,
            counters.ttl_drops,
            counters.buffer_drops,
            counters.dup_suppressed,
            counters.in_flight,
            counters.air_bytes
        );

        Ok(PlanRunReport {
            counters,
            deliveries,
            satellites: sat_queues
                .iter()
                .map(|(name, q)| BufferTotals {
                    name: name.clone(),
                    bytes_in: q.bytes_in,
                    bytes_dropped: q.bytes_dropped,
                })
                .collect(),
            source: BufferTotals {
                name: "source".to_string(),
                bytes_in: source_queue.bytes_in,
                bytes_dropped: source_queue.bytes_dropped,
            },
        })
    }
}

/// Move workload bundles satisfying `eligible` into the source buffer.
fn admit_created(
    workload: &[WorkloadBundle],
    pending: &mut usize,
    eligible: impl Fn(&WorkloadBundle) -> bool,
    plan: &ResolvedPlan,
    source_queue: &mut BundleQueue,
    rng: &mut StdRng,
    log: &mut EventLog,
) {
    while *pending < workload.len() && eligible(&workload[*pending]) {
        let bundle = &workload[*pending];
        log.emit(bundle.created_at, &format!("bundle {} RELEASED", bundle.id));
        source_queue.admit(
            QueueEntry {
                bundle_id: bundle.id,
                created_at: bundle.created_at,
                size_bytes: bundle.size_bytes,
                ttl_seconds: plan.ttl_seconds,
                ready_at: bundle.created_at,
            },
            rng,
        );
        *pending += 1;
    }
}

/// Uplink: GS source → this window's satellite.
///
/// Returns the bytes that crossed. At most the entries queued when the
/// phase began are processed, so a spray re-enqueue can never ride the
/// same pass twice.
fn run_uplink(
    window: &ContactWindow,
    plan: &ResolvedPlan,
    source_queue: &mut BundleQueue,
    sat_queue: &mut BundleQueue,
    states: &mut HashMap<u64, BundleState>,
    counters: &mut PlanCounters,
    expired: &mut Vec<u64>,
    rng: &mut StdRng,
    log: &mut EventLog,
) -> u64 {
    let take = source_queue.total_bytes().min(window.capacity_bytes as u64);
    let max_entries = source_queue.len();
    let rate = window.rate_bytes_per_second;
    let mut sent: u64 = 0;
    let mut processed = 0usize;

    while processed < max_entries && !source_queue.is_empty() {
        let remaining = take - sent;
        if remaining == 0 {
            break;
        }
        let Some(head) = source_queue.front() else {
            break;
        };
        let size = head.size_bytes;
        if remaining < size {
            // Partial transmission: the entry stays queued with the
            // remainder for the next contact.
            source_queue.shrink_front(remaining);
            sent += remaining;
            break;
        }
        let created_at = head.created_at;
        let deadline = head.deadline();
        let cursor = window.start + sent as f64 / rate;
        let tx_start = cursor.max(created_at);
        let arrival = tx_start + size as f64 / rate + window.propagation_delay_seconds;

        let Some(entry) = source_queue.pop_front() else {
            break;
        };
        sent += size;
        processed += 1;

        if deadline.is_some_and(|d| arrival > d) {
            // Transmitted, but stale on arrival: never enqueued upstream.
            counters.ttl_drops += 1;
            expired.push(entry.bundle_id);
            log.emit(
                arrival,
                &format!("bundle {} EXPIRED in transit", entry.bundle_id),
            );
            continue;
        }

        let state = match states.get_mut(&entry.bundle_id) {
            Some(s) => s,
            None => continue,
        };
        state.copies_sent += 1;
        let full_size = state.size_bytes;
        let more_copies = state.copies_sent < plan.copies;

        // Dwell: set once at admission, never on partial re-enqueue.
        let ready_at = if plan.min_dwell_seconds > 0.0 {
            arrival.max(window.end + plan.min_dwell_seconds)
        } else {
            arrival
        };

        log.emit(
            arrival,
            &format!(
                "bundle {} forwarded source -> {}",
                entry.bundle_id, window.satellite
            ),
        );
        sat_queue.admit(
            QueueEntry {
                bundle_id: entry.bundle_id,
                created_at: entry.created_at,
                size_bytes: full_size,
                ttl_seconds: entry.ttl_seconds,
                ready_at,
            },
            rng,
        );

        if more_copies {
            source_queue.admit(
                QueueEntry {
                    bundle_id: entry.bundle_id,
                    created_at: entry.created_at,
                    size_bytes: full_size,
                    ttl_seconds: entry.ttl_seconds,
                    ready_at: entry.created_at,
                },
                rng,
            );
        }
    }

    sent
}

/// Downlink: this window's satellite → GS destination.
///
/// A head entry that has not dwelled long enough halts the whole scan
/// (FIFO discipline preserves the scheduled order). Deliveries are
/// duplicate-suppressed on bundle id.
fn run_downlink(
    window: &ContactWindow,
    sat_queue: &mut BundleQueue,
    states: &HashMap<u64, BundleState>,
    delivered_ids: &mut HashSet<u64>,
    deliveries: &mut Vec<DeliveryRecord>,
    counters: &mut PlanCounters,
    expired: &mut Vec<u64>,
    log: &mut EventLog,
) -> u64 {
    let take = sat_queue.total_bytes().min(window.capacity_bytes as u64);
    let max_entries = sat_queue.len();
    let rate = window.rate_bytes_per_second;
    let mut sent: u64 = 0;
    let mut processed = 0usize;

    while processed < max_entries && !sat_queue.is_empty() {
        let remaining = take - sent;
        if remaining == 0 {
            break;
        }
        let Some(head) = sat_queue.front() else {
            break;
        };
        if head.ready_at > window.start {
            break;
        }
        let size = head.size_bytes;
        if remaining < size {
            sat_queue.shrink_front(remaining);
            sent += remaining;
            break;
        }
        let ready_at = head.ready_at;
        let deadline = head.deadline();
        let cursor = window.start + sent as f64 / rate;
        let tx_start = cursor.max(ready_at);
        let t_del = tx_start + size as f64 / rate + window.propagation_delay_seconds;

        let Some(entry) = sat_queue.pop_front() else {
            break;
        };
        sent += size;
        processed += 1;
        counters.downlink_transfers += 1;

        if deadline.is_some_and(|d| t_del > d) {
            counters.ttl_drops += 1;
            expired.push(entry.bundle_id);
            log.emit(
                t_del,
                &format!("bundle {} EXPIRED in transit", entry.bundle_id),
            );
            continue;
        }

        if delivered_ids.insert(entry.bundle_id) {
            let size_bytes = states
                .get(&entry.bundle_id)
                .map(|s| s.size_bytes)
                .unwrap_or(size);
            counters.delivered += 1;
            counters.payload_bytes_delivered += size_bytes;
            let latency = t_del - entry.created_at;
            deliveries.push(DeliveryRecord {
                bundle_id: entry.bundle_id,
                created_at: fmt_iso(entry.created_at),
                delivered_at: fmt_iso(t_del),
                size_bytes,
                latency_seconds: latency,
            });
            log.emit(
                t_del,
                &format!("bundle {} DELIVERED latency={latency:.1}s", entry.bundle_id),
            );
        } else {
            counters.dup_suppressed += 1;
        }
    }

    sent
}
